//! SAR Core - two-variant adoption dynamics, mean-field view
//!
//! This library holds the deterministic half of the model:
//! 1. **Degree distributions**: per-degree probability mass for edge-weighted sums
//! 2. **EBCM derivatives**: dθ/dt and the low/high threshold survival rates
//! 3. **RK4 integrator**: fixed-step classical Runge-Kutta over a time grid
//!
//! Configuration shared with the agent-based simulator (`sar_sim`) also lives
//! here so both views are driven by the same parameter bundle.

pub mod config;
pub mod degree;
pub mod ebcm;
pub mod error;
pub mod ode;

// Re-export key types for convenience
pub use config::{PopulationSplit, SarConfig, ThresholdPair};
pub use degree::DegreeDistribution;
pub use ebcm::{DegreeSupport, DomainViolation, EbcmParams, MeanFieldModel, MeanFieldSolution, SarState};
pub use error::CoreError;
pub use ode::{integrate, linspace, rk4_step, Trajectory};
