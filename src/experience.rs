use crate::state::State;

/// One recorded environment step. Never mutated once stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: State,
    pub action: usize,
    pub reward: f32,
    pub next_state: State,
    pub done: bool,
}
