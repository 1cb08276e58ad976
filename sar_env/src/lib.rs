//! SAR Environment Abstraction Layer
//!
//! The two adoption engines never touch a concrete graph type or a concrete
//! random number generator. They talk to this crate instead:
//!
//! - **Topology**: [`ContactGraph`] answers "who are the neighbors of node v"
//! - **Randomness**: [`UniformSource`] hands out independent uniform draws
//!
//! Any `rand::Rng` is a `UniformSource`, so production runs use a seeded
//! ChaCha stream while tests can replay a fixed script of draws through
//! [`ScriptedSource`] and check transitions by hand.
//!
//! # Example
//!
//! ```ignore
//! use sar_env::{ContactGraph, UniformSource};
//!
//! fn informed_fraction<G: ContactGraph, U: UniformSource>(graph: &G, src: &mut U) -> f64 {
//!     let hits = (0..graph.node_count())
//!         .filter(|_| src.next_uniform() < 0.5)
//!         .count();
//!     hits as f64 / graph.node_count() as f64
//! }
//! ```

mod context;
mod network;
mod types;
mod error;

pub use context::{UniformSource, ScriptedSource};
pub use network::ContactGraph;
pub use types::NodeId;
pub use error::EnvError;
