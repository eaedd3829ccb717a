use rand::Rng;
use serde::{Deserialize, Serialize};

/// Observation of the can: temperature and its rate of change over the last
/// control interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub temperature: f64,
    pub rate: f64,
}

impl State {
    pub const DIM: usize = 2;

    pub fn new(temperature: f64, rate: f64) -> Self {
        Self { temperature, rate }
    }

    pub fn to_features(&self) -> [f32; Self::DIM] {
        [self.temperature as f32, self.rate as f32]
    }
}

/// Discrete set of heating levels `0..n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpace {
    pub n: usize,
}

impl ActionSpace {
    pub fn new(n: usize) -> Self {
        Self { n }
    }

    pub fn contains(&self, action: usize) -> bool {
        action < self.n
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.random_range(0..self.n)
    }
}

/// Per-channel bounds of the observation vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservationSpace {
    pub low: [f64; State::DIM],
    pub high: [f64; State::DIM],
}

impl ObservationSpace {
    pub fn contains(&self, state: &State) -> bool {
        let values = [state.temperature, state.rate];
        values
            .iter()
            .zip(self.low.iter().zip(self.high.iter()))
            .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn features_have_fixed_dimension() {
        let features = State::new(21.5, -0.25).to_features();
        assert_eq!(features.len(), State::DIM);
        assert_eq!(features, [21.5, -0.25]);
    }

    #[test]
    fn action_space_samples_are_contained() {
        let space = ActionSpace::new(20);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            assert!(space.contains(space.sample(&mut rng)));
        }
        assert!(!space.contains(20));
    }
}
