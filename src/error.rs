//! Error types for the vacuum-can trainer

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Action index outside the environment's discrete action set
    #[error("invalid action {action}: action space has {n_actions} levels")]
    InvalidAction { action: usize, n_actions: usize },

    /// Sampling a non-empty batch from an empty replay buffer
    #[error("cannot sample from an empty replay buffer")]
    EmptyBufferSample,

    /// The thermal integrator produced a non-finite temperature
    #[error("thermal integration diverged (temperature = {temperature})")]
    NumericalDivergence { temperature: f64 },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Saving or loading learner parameters failed
    #[error("checkpoint {path} failed: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// The shared parameter map could not be locked (a writer panicked)
    #[error("parameter store unavailable: {0}")]
    ParameterStore(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Candle(#[from] candle_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),
}

impl Error {
    pub(crate) fn checkpoint(path: impl Into<PathBuf>, source: Error) -> Self {
        Error::Checkpoint {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
