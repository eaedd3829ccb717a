use std::path::Path;

use crate::{
    error::{Error, Result},
    experience::Transition,
    state::State,
};

/// Action-value approximator used by the policy and the training loop.
pub trait Learner {
    fn num_actions(&self) -> usize;

    fn predict_batch(&self, states: &[State]) -> Result<Vec<Vec<f32>>>;

    /// One optimisation step on the mean-squared error between the current
    /// predictions and `targets`. Returns the loss before the step.
    fn update(&mut self, states: &[State], targets: &[Vec<f32>]) -> Result<f32>;

    fn save(&self, path: &Path) -> Result<()>;

    fn load(&mut self, path: &Path) -> Result<()>;

    fn predict(&self, state: &State) -> Result<Vec<f32>> {
        self.predict_batch(std::slice::from_ref(state))?
            .into_iter()
            .next()
            .ok_or(Error::DimensionMismatch {
                expected: 1,
                actual: 0,
            })
    }
}

/// Build `(states, targets)` for a semi-gradient Q update.
///
/// Each target row starts as the learner's current prediction for the state,
/// so only the taken action contributes to the loss. That entry becomes
/// `reward` for terminal transitions and `reward + gamma * max_a Q(next, a)`
/// otherwise.
pub fn bootstrapped_targets<L: Learner + ?Sized>(
    learner: &L,
    batch: &[&Transition],
    gamma: f32,
) -> Result<(Vec<State>, Vec<Vec<f32>>)> {
    let states: Vec<State> = batch.iter().map(|t| t.state).collect();
    let next_states: Vec<State> = batch.iter().map(|t| t.next_state).collect();

    let mut targets = learner.predict_batch(&states)?;
    let next_values = learner.predict_batch(&next_states)?;

    for ((row, next), transition) in targets.iter_mut().zip(&next_values).zip(batch) {
        if transition.action >= row.len() {
            return Err(Error::InvalidAction {
                action: transition.action,
                n_actions: row.len(),
            });
        }
        row[transition.action] = if transition.done {
            transition.reward
        } else {
            let best_next = next.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            transition.reward + gamma * best_next
        };
    }

    Ok((states, targets))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Predicts `[T, 2T, 3T]` for temperature `T`.
    struct Linear3;

    impl Learner for Linear3 {
        fn num_actions(&self) -> usize {
            3
        }

        fn predict_batch(&self, states: &[State]) -> Result<Vec<Vec<f32>>> {
            Ok(states
                .iter()
                .map(|s| {
                    let t = s.temperature as f32;
                    vec![t, 2.0 * t, 3.0 * t]
                })
                .collect())
        }

        fn update(&mut self, _: &[State], _: &[Vec<f32>]) -> Result<f32> {
            Ok(0.0)
        }

        fn save(&self, _: &Path) -> Result<()> {
            Ok(())
        }

        fn load(&mut self, _: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn transition(action: usize, done: bool) -> Transition {
        Transition {
            state: State::new(1.0, 0.0),
            action,
            reward: 1.0,
            next_state: State::new(2.0, 0.0),
            done,
        }
    }

    #[test]
    fn only_taken_action_is_retargeted() {
        let t = transition(0, false);
        let (states, targets) = bootstrapped_targets(&Linear3, &[&t], 0.5).unwrap();
        assert_eq!(states, vec![t.state]);
        // 1 + 0.5 * max(2, 4, 6)
        assert_eq!(targets, vec![vec![4.0, 2.0, 3.0]]);
    }

    #[test]
    fn terminal_target_is_reward() {
        let t = transition(2, true);
        let (_, targets) = bootstrapped_targets(&Linear3, &[&t], 0.99).unwrap();
        assert_eq!(targets, vec![vec![1.0, 2.0, 1.0]]);
    }

    #[test]
    fn out_of_range_action_is_rejected() {
        let t = transition(3, false);
        assert!(matches!(
            bootstrapped_targets(&Linear3, &[&t], 1.0),
            Err(Error::InvalidAction { action: 3, .. })
        ));
    }

    #[test]
    fn predict_defaults_to_single_row_batch() {
        let values = Linear3.predict(&State::new(2.0, 0.0)).unwrap();
        assert_eq!(values, vec![2.0, 4.0, 6.0]);
    }
}
