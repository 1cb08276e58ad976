//! Error types for the mean-field engine and shared configuration.

use thiserror::Error;

/// Errors raised by configuration, degree distributions and the integrator.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A degree visited by a derivative sum has no probability mass
    #[error("Missing degree mass: no p_k for degree {degree}")]
    MissingDegreeMass { degree: u32 },
    
    /// Degree distribution is malformed (negative mass, zero degree, bad sum)
    #[error("Invalid degree distribution: {0}")]
    InvalidDistribution(String),
    
    /// A scalar parameter is outside its domain
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    
    /// Time grid is empty or not strictly increasing
    #[error("Invalid time grid: {0}")]
    InvalidGrid(String),
    
    /// Integration produced NaN or infinity
    #[error("Non-finite value in component {component} at step {step} (t = {time})")]
    NonFinite { step: usize, time: f64, component: usize },
    
    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
    
    /// Configuration file could not be read
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Creates an invalid parameter error.
    pub fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
    
    /// Creates an invalid distribution error.
    pub fn distribution(msg: impl Into<String>) -> Self {
        Self::InvalidDistribution(msg.into())
    }
}
