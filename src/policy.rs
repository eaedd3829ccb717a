use rand::Rng;

use crate::{
    config::AgentConfig,
    error::{Error, Result},
    learner::Learner,
    state::{ActionSpace, State},
};

/// Index of the largest value; ties go to the lowest index.
pub fn greedy_action(values: &[f32]) -> Option<usize> {
    let (first, rest) = values.split_first()?;
    let mut best = (0, *first);
    for (i, &v) in rest.iter().enumerate() {
        if v > best.1 {
            best = (i + 1, v);
        }
    }
    Some(best.0)
}

#[derive(Debug, Clone, Copy)]
pub struct EpsilonGreedy {
    action_space: ActionSpace,
}

impl EpsilonGreedy {
    pub fn new(action_space: ActionSpace) -> Self {
        Self { action_space }
    }

    /// Random action with probability `epsilon`, otherwise the learner's
    /// greedy action for `state`.
    pub fn select_action<L, R>(
        &self,
        learner: &L,
        state: &State,
        epsilon: f64,
        rng: &mut R,
    ) -> Result<usize>
    where
        L: Learner + ?Sized,
        R: Rng + ?Sized,
    {
        if rng.random::<f64>() < epsilon {
            return Ok(self.action_space.sample(rng));
        }
        let values = learner.predict(state)?;
        greedy_action(&values)
            .filter(|_| values.len() == self.action_space.n)
            .ok_or(Error::DimensionMismatch {
                expected: self.action_space.n,
                actual: values.len(),
            })
    }
}

/// Exploration schedule.
///
/// Per episode: `1 - log10((episode + 1) * decay)` clipped to
/// `[min, ceiling]`, where the ceiling is the session's current epsilon.
/// Per replayed transition the ceiling itself shrinks by `decay` down to `min`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsilonSchedule {
    pub start: f64,
    pub min: f64,
    pub decay: f64,
}

impl EpsilonSchedule {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            start: config.epsilon_start,
            min: config.epsilon_min,
            decay: config.epsilon_decay,
        }
    }

    pub fn epsilon_for_episode(&self, episode: usize, ceiling: f64) -> f64 {
        let raw = 1.0 - ((episode as f64 + 1.0) * self.decay).log10();
        raw.min(ceiling.min(self.start)).max(self.min)
    }

    pub fn decay(&self, epsilon: f64) -> f64 {
        if epsilon > self.min {
            (epsilon * self.decay).max(self.min)
        } else {
            epsilon
        }
    }
}
