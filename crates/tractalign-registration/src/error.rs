//! Error types for registration operations.
//!
//! Configuration and I/O problems abort a run before any scale executes;
//! data errors surface from the first objective evaluation that meets them;
//! optimization errors carry the scale and iteration where they occurred.

use thiserror::Error;

/// Main error type for registration operations.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// Unknown mode, invalid schedule or incompatible mode sequencing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Empty or malformed fiber data.
    #[error("Data error: {0}")]
    Data(String),

    /// Persistence failure reported by a sink.
    #[error("I/O error: {0}")]
    Io(String),

    /// The optimizer could not produce a usable result.
    #[error("Optimization error at scale {scale}, iteration {iteration}: {message}")]
    Optimization {
        scale: usize,
        iteration: usize,
        message: String,
    },

    /// Tensor read-back failed while applying a transform.
    #[error("Transform error: {0}")]
    Transform(String),
}

/// Result type for registration operations.
pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    /// Create an I/O error.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Create an optimization error not yet tied to a scale.
    pub fn optimization(msg: impl Into<String>) -> Self {
        Self::Optimization {
            scale: 0,
            iteration: 0,
            message: msg.into(),
        }
    }

    /// Create a transform error.
    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    /// Attach the scale and iteration index to an optimization error.
    /// Other variants pass through unchanged.
    pub fn at_stage(self, scale: usize, iteration: usize) -> Self {
        match self {
            Self::Optimization { message, .. } => Self::Optimization {
                scale,
                iteration,
                message,
            },
            other => other,
        }
    }
}

impl From<burn::tensor::DataError> for RegistrationError {
    fn from(err: burn::tensor::DataError) -> Self {
        Self::transform(format!("{:?}", err))
    }
}
