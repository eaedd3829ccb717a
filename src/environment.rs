use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    config::ChamberConfig,
    error::{Error, Result},
    physics::ChamberModel,
    state::{ActionSpace, ObservationSpace, State},
};

/// Capability the training loop drives. Any simulation with a discrete action
/// set and a fixed-size observation can stand in for the vacuum can.
pub trait Environment {
    fn action_space(&self) -> ActionSpace;
    fn observation_space(&self) -> ObservationSpace;
    fn reset(&mut self) -> State;
    fn step(&mut self, action: usize) -> Result<Step>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    TooCold,
    TooHot,
    Diverged,
    StepLimit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Seconds simulated since the last reset
    pub elapsed: f64,
    pub ambient: f64,
    pub heat_input: f64,
    pub setpoint_error: f64,
    pub truncated: bool,
    pub termination: Option<Termination>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub next_state: State,
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}

/// Heated vacuum can in a room whose temperature drifts over the day.
pub struct VacuumCan {
    config: ChamberConfig,
    model: ChamberModel,
    rng: StdRng,
    state: State,
    elapsed: f64,
    steps: usize,
    termination: Option<Termination>,
    steps_beyond_done: Option<usize>,
}

impl VacuumCan {
    pub fn new(config: ChamberConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let state = State::new(config.reset_low, 0.0);
        Ok(Self {
            model: ChamberModel::from_config(&config),
            config,
            rng,
            state,
            elapsed: 0.0,
            steps: 0,
            termination: None,
            steps_beyond_done: None,
        })
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Start an episode from an exact temperature.
    pub fn reset_to(&mut self, temperature: f64) -> State {
        self.state = State::new(temperature, 0.0);
        self.elapsed = 0.0;
        self.steps = 0;
        self.termination = None;
        self.steps_beyond_done = None;
        self.state
    }

    pub fn heat_input(&self, action: usize) -> f64 {
        action as f64 * self.config.heat_per_level
    }

    fn info(&self, heat_input: f64, truncated: bool) -> StepInfo {
        StepInfo {
            elapsed: self.elapsed,
            ambient: self.model.ambient(self.elapsed),
            heat_input,
            setpoint_error: self.state.temperature - self.config.setpoint,
            truncated,
            termination: self.termination,
        }
    }

    fn classify(&self, temperature: f64) -> Option<Termination> {
        if temperature < self.config.safety_low {
            Some(Termination::TooCold)
        } else if temperature > self.config.safety_high {
            Some(Termination::TooHot)
        } else {
            None
        }
    }
}

impl Environment for VacuumCan {
    fn action_space(&self) -> ActionSpace {
        ActionSpace::new(self.config.n_actions)
    }

    fn observation_space(&self) -> ObservationSpace {
        ObservationSpace {
            low: [self.config.setpoint - 30.0, f64::NEG_INFINITY],
            high: [self.config.setpoint + 30.0, f64::INFINITY],
        }
    }

    fn reset(&mut self) -> State {
        let temperature = self
            .rng
            .random_range(self.config.reset_low..=self.config.reset_high);
        self.reset_to(temperature)
    }

    fn step(&mut self, action: usize) -> Result<Step> {
        if !self.action_space().contains(action) {
            return Err(Error::InvalidAction {
                action,
                n_actions: self.config.n_actions,
            });
        }
        let heat_input = self.heat_input(action);

        if let Some(beyond) = self.steps_beyond_done.as_mut() {
            if *beyond == 0 {
                warn!(
                    "step() called after the episode already returned done = true; \
                     call reset() first, further steps give no reward"
                );
            }
            *beyond += 1;
            return Ok(Step {
                next_state: self.state,
                reward: 0.0,
                done: true,
                info: self.info(heat_input, false),
            });
        }

        let interval = self.config.control_interval;
        let previous = self.state.temperature;
        let integrated = self.model.integrate(
            previous,
            self.elapsed,
            interval,
            heat_input,
            self.config.integration_substeps,
        );
        self.elapsed += interval;
        self.steps += 1;

        let termination = match integrated {
            Ok(temperature) => {
                self.state = State::new(temperature, (temperature - previous) / interval);
                self.classify(temperature)
            }
            Err(Error::NumericalDivergence { temperature }) => {
                warn!(
                    temperature,
                    heat_input, "thermal integration diverged, ending episode"
                );
                self.state = State::new(previous, 0.0);
                Some(Termination::Diverged)
            }
            Err(err) => return Err(err),
        };

        let truncated = termination.is_none()
            && self
                .config
                .max_episode_steps
                .is_some_and(|limit| self.steps >= limit);
        self.termination = termination.or(truncated.then_some(Termination::StepLimit));

        let done = self.termination.is_some();
        if done {
            self.steps_beyond_done = Some(0);
        }

        Ok(Step {
            next_state: self.state,
            reward: 1.0,
            done,
            info: self.info(heat_input, truncated),
        })
    }
}
