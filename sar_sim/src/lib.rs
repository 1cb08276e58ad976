//! SAR Simulator - agent-based adoption dynamics, sweeps and persistence
//!
//! Nodes of a contact network move through
//! `Susceptible(low|high) -> Active(A|B) -> Recovered(A|B)`. Every source of
//! randomness is a ChaCha8 stream derived from one 64-bit seed, so any run or
//! sweep can be replayed exactly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        SweepRunner                          │
//! │   (α, λ) cells in parallel (rayon), one RunContext each     │
//! │       │                                                     │
//! │  ┌────▼──────────┐   ┌──────────────┐   ┌────────────────┐  │
//! │  │ ContactNetwork│──►│ initialize() │──►│TransitionEngine│  │
//! │  │ (connected ER)│   │ thresholds,  │   │ decide + apply │  │
//! │  └───────────────┘   │ adopters     │   └───────┬────────┘  │
//! │                      └──────────────┘           │           │
//! │                                          SeriesSet (aa..r)  │
//! │                                                 │           │
//! │                                   ResultTable ──► CSV       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The mean-field counterpart lives in `sar_core`; [`MeanFieldSweep`] runs it
//! over the same grid.
//!
//! # Usage
//!
//! ```ignore
//! use sar_core::SarConfig;
//! use sar_sim::{arange, SweepRunner};
//!
//! let results = SweepRunner::new(SarConfig::default())
//!     .with_alphas(arange(0.0, 1.1, 0.1))
//!     .with_lambdas(arange(0.0, 1.0, 0.1))
//!     .with_iterations(1, 20)
//!     .run()?;
//! results.write_csv_dir("simulation_results")?;
//! ```

mod context;
mod engine;
mod error;
mod exporter;
mod initializer;
mod network;
mod results;
mod runner;
mod state;
pub mod modes;

pub use context::RunContext;
pub use engine::{apply, SeriesSet, StepDecisions, StepOutcome, TransitionEngine, TransitionRates};
pub use error::SimError;
pub use exporter::{MeanFieldExport, RunExport};
pub use initializer::{initialize, NetworkState};
pub use network::ContactNetwork;
pub use results::{align_to_max, ResultTable, CSV_HEADER};
pub use runner::{
    arange, run_agent, run_mean_field, AgentRun, MeanFieldSweep, SweepManifest, SweepResults, SweepRunner,
    DEFAULT_MAX_ATTEMPTS, MANIFEST_FILE,
};
pub use state::{NodeState, StateCounts, ThresholdClass, Variant};
