//! Configuration shared by the mean-field and agent-based views.
//!
//! Everything that the reference scripts kept as module-level globals (the
//! threshold pair, the low/high population split) is an explicit field here
//! and is threaded through every call that needs it.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The two adoption thresholds: low-threshold nodes adopt variant A,
/// high-threshold nodes adopt variant B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdPair {
    /// Informed neighbors required by low-threshold nodes
    pub low: u32,

    /// Informed neighbors required by high-threshold nodes.
    ///
    /// Also the fixed upper bound of the binomial sums in the EBCM
    /// derivatives (sums run over m = 0..high).
    pub high: u32,
}

impl ThresholdPair {
    /// Creates a threshold pair.
    pub fn new(low: u32, high: u32) -> Self {
        Self { low, high }
    }

    /// Checks that both thresholds are at least one.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.low == 0 || self.high == 0 {
            return Err(CoreError::parameter(
                "thresholds",
                format!("thresholds must be >= 1, got ({}, {})", self.low, self.high),
            ));
        }
        Ok(())
    }
}

impl Default for ThresholdPair {
    fn default() -> Self {
        Self { low: 1, high: 4 }
    }
}

/// Population shares of the two threshold classes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulationSplit {
    /// Share of nodes with the low threshold (p_low)
    pub low: f64,

    /// Share of nodes with the high threshold (p_high)
    pub high: f64,
}

impl PopulationSplit {
    /// Builds a split from the low-threshold share; `high = 1 - low`.
    pub fn from_low_share(low: f64) -> Self {
        Self { low, high: 1.0 - low }
    }

    /// Checks both shares lie in [0, 1] and sum to one.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(0.0..=1.0).contains(&self.low) || !(0.0..=1.0).contains(&self.high) {
            return Err(CoreError::parameter(
                "population",
                format!("shares must lie in [0, 1], got ({}, {})", self.low, self.high),
            ));
        }
        if (self.low + self.high - 1.0).abs() > 1e-9 {
            return Err(CoreError::parameter(
                "population",
                format!("shares must sum to 1, got {}", self.low + self.high),
            ));
        }
        Ok(())
    }
}

impl Default for PopulationSplit {
    fn default() -> Self {
        Self::from_low_share(0.2)
    }
}

/// Full parameter bundle for one model run.
///
/// Defaults follow the reference sweep: 10 000 nodes on an ER graph of mean
/// degree 10, one initial adopter, γ = 1, thresholds (1, 4), 20 % activists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SarConfig {
    /// Spontaneous adoption rate α
    pub alpha: f64,

    /// Peer transmission rate λ
    pub lambda: f64,

    /// Recovery rate γ
    pub gamma: f64,

    /// Initial adopter fraction ρ0
    pub rho0: f64,

    /// Threshold pair (low, high)
    pub thresholds: ThresholdPair,

    /// Low/high threshold population shares
    pub population: PopulationSplit,

    /// Number of nodes in the contact network
    pub node_count: usize,

    /// Mean degree of the generated Erdős–Rényi network
    pub mean_degree: f64,

    /// Number of discrete steps in the agent-based run
    pub steps: usize,

    /// Largest degree kept when building a Poisson degree distribution
    pub k_max: u32,

    /// End time of the mean-field integration
    pub t_end: f64,

    /// Number of mean-field grid points (including t = 0)
    pub grid_points: usize,

    /// Master seed for determinism
    pub seed: u64,
}

impl Default for SarConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            lambda: 0.5,
            gamma: 1.0,
            rho0: 1.0 / 10_000.0,
            thresholds: ThresholdPair::default(),
            population: PopulationSplit::default(),
            node_count: 10_000,
            mean_degree: 10.0,
            steps: 100,
            k_max: 40,
            t_end: 100.0,
            grid_points: 1001,
            seed: 42,
        }
    }
}

impl SarConfig {
    /// Loads a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every scalar against its domain.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(CoreError::parameter("alpha", format!("must be finite and >= 0, got {}", self.alpha)));
        }
        check_probability("lambda", self.lambda)?;
        check_probability("gamma", self.gamma)?;
        check_probability("rho0", self.rho0)?;
        self.thresholds.validate()?;
        self.population.validate()?;

        if self.node_count == 0 {
            return Err(CoreError::parameter("node_count", "must be > 0"));
        }
        if !self.mean_degree.is_finite() || self.mean_degree < 0.0 {
            return Err(CoreError::parameter("mean_degree", format!("must be >= 0, got {}", self.mean_degree)));
        }
        if self.grid_points == 0 {
            return Err(CoreError::parameter("grid_points", "must be > 0"));
        }
        if !(self.t_end > 0.0) {
            return Err(CoreError::parameter("t_end", format!("must be > 0, got {}", self.t_end)));
        }
        Ok(())
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), CoreError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(CoreError::parameter(name, format!("must lie in [0, 1], got {}", value)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SarConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.thresholds, ThresholdPair::new(1, 4));
        assert!((config.population.high - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_out_of_range_probability() {
        let config = SarConfig {
            gamma: 1.5,
            ..Default::default()
        };

        match config.validate() {
            Err(CoreError::InvalidParameter { name, .. }) => assert_eq!(name, "gamma"),
            other => panic!("expected gamma rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_zero_threshold() {
        let config = SarConfig {
            thresholds: ThresholdPair::new(0, 4),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: SarConfig = serde_json::from_str(r#"{ "alpha": 0.3, "node_count": 500 }"#).unwrap();

        assert_eq!(config.alpha, 0.3);
        assert_eq!(config.node_count, 500);
        assert_eq!(config.steps, 100);
        assert_eq!(config.thresholds.high, 4);
    }
}
