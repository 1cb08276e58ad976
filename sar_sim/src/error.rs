//! Error types for the simulator, sweeps and result persistence.

use sar_core::CoreError;
use sar_env::EnvError;
use thiserror::Error;

/// Errors surfaced by `sar_sim`.
#[derive(Debug, Error)]
pub enum SimError {
    /// Configuration or mean-field failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Contact graph could not be built
    #[error(transparent)]
    Env(#[from] EnvError),

    /// Persisted data does not match the expected α × λ × iteration × time shape
    #[error("Shape mismatch: expected {expected} values, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    /// A result file line could not be parsed
    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// An argument is inconsistent with the data it applies to
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// File I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON export failure
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl SimError {
    /// Creates a shape mismatch error.
    pub fn shape(expected: usize, found: usize) -> Self {
        Self::ShapeMismatch { expected, found }
    }

    /// Creates a parse error for a 1-based line number.
    pub fn parse(line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            line,
            reason: reason.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
