//! Seed derivation for independent random streams.
//!
//! Every random decision in a sweep comes from a ChaCha8 stream derived from
//! one 64-bit master seed. Streams are addressed by index, so a cell of the
//! sweep gets the same draws no matter which thread runs it or how many
//! other cells exist.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Golden-ratio multiplier applied to the parent seed.
const SEED_MULTIPLIER: u64 = 0x9e3779b97f4a7c15;

/// Odd constant spreading the stream index.
const STREAM_MULTIPLIER: u64 = 0x517cc1b727220a95;

/// Stream index of the contact network within a run context.
pub const NETWORK_STREAM: u64 = 0;

/// Seed context for one run (or one sweep cell).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    seed: u64,
}

impl RunContext {
    /// Creates a context from a master seed.
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed of this context.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Seed of stream `stream`: `seed * φ + stream * prime` (wrapping).
    pub fn stream_seed(&self, stream: u64) -> u64 {
        self.seed
            .wrapping_mul(SEED_MULTIPLIER)
            .wrapping_add(stream.wrapping_mul(STREAM_MULTIPLIER))
    }

    /// Fresh RNG for stream `stream`.
    pub fn rng(&self, stream: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.stream_seed(stream))
    }

    /// Nested context for a sub-task (sweep cell, network iteration).
    pub fn child(&self, index: u64) -> RunContext {
        RunContext::new(self.stream_seed(index))
    }

    /// RNG for the contact network of this context.
    pub fn network_rng(&self) -> ChaCha8Rng {
        self.rng(NETWORK_STREAM)
    }

    /// RNG for the `iteration`-th simulation on this context's network.
    pub fn simulation_rng(&self, iteration: u64) -> ChaCha8Rng {
        self.rng(iteration + 1)
    }
}
