//! Deep Q-learning controller for the temperature of a heated vacuum can.
//!
//! [`VacuumCan`] simulates the can, [`QNetwork`] approximates action values and
//! [`Trainer`] ties them together with epsilon-greedy exploration and
//! experience replay.

pub mod config;
pub mod device;
pub mod environment;
pub mod error;
pub mod experience;
pub mod history;
pub mod learner;
pub mod mlp;
pub mod physics;
pub mod policy;
pub mod replay;
pub mod state;
pub mod trainer;

pub use config::{AgentConfig, ChamberConfig, TrainingConfig};
pub use environment::{Environment, Step, StepInfo, Termination, VacuumCan};
pub use error::{Error, Result};
pub use experience::Transition;
pub use history::{EpisodeRecord, TrainingHistory};
pub use learner::{Learner, bootstrapped_targets};
pub use mlp::QNetwork;
pub use policy::{EpsilonGreedy, EpsilonSchedule, greedy_action};
pub use replay::ReplayBuffer;
pub use state::{ActionSpace, ObservationSpace, State};
pub use trainer::{Phase, Session, Trainer, TrainingOutcome, TrainingReport};
