//! Training configuration.
//!
//! Every field has a default, so a JSON file only needs to name the values it
//! overrides.

use std::{fs::File, io::BufReader, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Physical and episode parameters of the vacuum can.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChamberConfig {
    /// Thermal conductivity of the insulation (W / m K)
    pub conductivity: f64,
    /// Surface area (m^2)
    pub area: f64,
    /// Insulation thickness (m)
    pub thickness: f64,
    /// Mass of the can (kg)
    pub mass: f64,
    /// Specific heat capacity (J / kg K)
    pub heat_capacity: f64,

    pub n_actions: usize,
    /// Heat input added per action level (W)
    pub heat_per_level: f64,
    /// Seconds between control decisions
    pub control_interval: f64,
    pub integration_substeps: usize,

    pub ambient_baseline: f64,
    pub ambient_amplitude: f64,
    /// Period of the ambient oscillation (s)
    pub ambient_period: f64,

    pub setpoint: f64,
    pub safety_low: f64,
    pub safety_high: f64,
    pub reset_low: f64,
    pub reset_high: f64,
    pub max_episode_steps: Option<usize>,
    pub seed: Option<u64>,
}

impl Default for ChamberConfig {
    fn default() -> Self {
        Self {
            conductivity: 1.136 * 25e-3,
            area: 1.3,
            thickness: 5.08e-2,
            mass: 15.76,
            heat_capacity: 505.0,
            n_actions: 20,
            heat_per_level: 20.0,
            control_interval: 1.0,
            integration_substeps: 10,
            ambient_baseline: 20.0,
            ambient_amplitude: 5.0,
            ambient_period: 6.0 * 3600.0,
            setpoint: 45.0,
            safety_low: 15.0,
            safety_high: 60.0,
            reset_low: 15.0,
            reset_high: 30.0,
            max_episode_steps: Some(1000),
            seed: None,
        }
    }
}

impl ChamberConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_actions == 0 {
            return Err(Error::Config("n_actions must be positive".into()));
        }
        let bounds = [
            self.safety_low,
            self.safety_high,
            self.reset_low,
            self.reset_high,
        ];
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(Error::Config(format!(
                "safety band and reset range must be finite, got {bounds:?}"
            )));
        }
        if self.safety_low >= self.safety_high {
            return Err(Error::Config(format!(
                "safety band [{}, {}] is empty",
                self.safety_low, self.safety_high
            )));
        }
        if self.reset_low > self.reset_high {
            return Err(Error::Config(format!(
                "reset range [{}, {}] is empty",
                self.reset_low, self.reset_high
            )));
        }
        if self.reset_low < self.safety_low || self.reset_high > self.safety_high {
            return Err(Error::Config(format!(
                "reset range [{}, {}] lies outside the safety band [{}, {}]",
                self.reset_low, self.reset_high, self.safety_low, self.safety_high
            )));
        }
        if self.control_interval <= 0.0 || self.integration_substeps == 0 {
            return Err(Error::Config(
                "control interval and substeps must be positive".into(),
            ));
        }
        if self.thickness <= 0.0 || self.mass <= 0.0 || self.heat_capacity <= 0.0 {
            return Err(Error::Config(
                "thickness, mass and heat capacity must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Learning hyper-parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub gamma: f32,
    pub epsilon_start: f64,
    pub epsilon_min: f64,
    /// Used both by the logarithmic episode schedule and the per-transition decay
    pub epsilon_decay: f64,
    pub learning_rate: f64,
    /// Inverse-time learning-rate decay per update
    pub learning_rate_decay: f64,
    pub max_grad_norm: f32,
    pub hidden_layers: Vec<usize>,
    pub batch_size: usize,
    pub replay_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            gamma: 1.0,
            epsilon_start: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.995,
            learning_rate: 0.05,
            learning_rate_decay: 0.01,
            max_grad_norm: 1.0,
            hidden_layers: vec![12, 24],
            batch_size: 64,
            replay_capacity: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub chamber: ChamberConfig,
    pub agent: AgentConfig,
    pub n_episodes: usize,
    /// Rolling mean return that counts as solved
    pub win_threshold: f64,
    pub score_window: usize,
    /// Upper bound on steps per episode, whatever the environment reports
    pub max_steps_per_episode: usize,
    pub checkpoint_every: usize,
    pub checkpoint_path: PathBuf,
    pub history_path: PathBuf,
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            chamber: ChamberConfig::default(),
            agent: AgentConfig::default(),
            n_episodes: 3500,
            win_threshold: 999.0,
            score_window: 50,
            max_steps_per_episode: 1000,
            checkpoint_every: 50,
            checkpoint_path: PathBuf::from("vaccan-model0.safetensors"),
            history_path: PathBuf::from("output/training_history.csv"),
            seed: None,
        }
    }
}

impl TrainingConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.chamber.validate()?;
        let a = &self.agent;
        if !(0.0..=1.0).contains(&a.epsilon_min)
            || !(0.0..=1.0).contains(&a.epsilon_start)
            || a.epsilon_min > a.epsilon_start
        {
            return Err(Error::Config(format!(
                "epsilon bounds [{}, {}] are invalid",
                a.epsilon_min, a.epsilon_start
            )));
        }
        if a.epsilon_decay <= 0.0 {
            return Err(Error::Config("epsilon_decay must be positive".into()));
        }
        if a.replay_capacity == 0 {
            return Err(Error::Config("replay_capacity must be positive".into()));
        }
        if self.score_window == 0 {
            return Err(Error::Config("score_window must be positive".into()));
        }
        if self.max_steps_per_episode == 0 {
            return Err(Error::Config("max_steps_per_episode must be positive".into()));
        }
        Ok(())
    }
}
