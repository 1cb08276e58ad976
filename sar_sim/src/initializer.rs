//! Initial node labels, thresholds and adopters for one agent-based run.

use crate::error::SimError;
use crate::state::{NodeState, StateCounts, ThresholdClass, Variant};
use rand::seq::index;
use rand::Rng;
use sar_core::{PopulationSplit, ThresholdPair};
use sar_env::NodeId;
use std::collections::HashSet;
use tracing::debug;

/// Mutable per-node state of an agent-based run.
///
/// Every vector is indexed by `NodeId` and has one entry per node.
#[derive(Debug, Clone)]
pub struct NetworkState {
    /// Current label of each node
    pub states: Vec<NodeState>,

    /// Neighbors that have informed each node so far
    pub informed: Vec<HashSet<NodeId>>,

    /// Informed neighbors each node needs before it adopts
    pub thresholds: Vec<u32>,
}

impl NetworkState {
    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.states.len()
    }

    /// Head count per label.
    pub fn counts(&self) -> StateCounts {
        StateCounts::from_states(&self.states)
    }

    /// Active nodes of variant A.
    pub fn active_a(&self) -> usize {
        self.states.iter().filter(|s| **s == NodeState::Active(Variant::A)).count()
    }

    /// Active nodes of variant B.
    pub fn active_b(&self) -> usize {
        self.states.iter().filter(|s| **s == NodeState::Active(Variant::B)).count()
    }
}

/// Builds the initial state of a run.
///
/// The first ⌊p_low·V⌋ nodes by index get the low threshold and the rest the
/// high one. Then ⌊V·ρ0⌋ distinct nodes, sampled uniformly without
/// replacement, are promoted to the variant of their class. Both floors
/// truncate.
pub fn initialize<R: Rng + ?Sized>(
    node_count: usize,
    rho0: f64,
    thresholds: ThresholdPair,
    population: PopulationSplit,
    rng: &mut R,
) -> Result<NetworkState, SimError> {
    if !(0.0..=1.0).contains(&rho0) {
        return Err(SimError::invalid(format!("rho0 must lie in [0, 1], got {}", rho0)));
    }
    thresholds.validate()?;
    population.validate()?;

    let low_count = ((population.low * node_count as f64).floor() as usize).min(node_count);
    let adopter_count = ((node_count as f64 * rho0).floor() as usize).min(node_count);

    let mut states = Vec::with_capacity(node_count);
    let mut node_thresholds = Vec::with_capacity(node_count);
    for node in 0..node_count {
        if node < low_count {
            states.push(NodeState::Susceptible(ThresholdClass::Low));
            node_thresholds.push(thresholds.low);
        } else {
            states.push(NodeState::Susceptible(ThresholdClass::High));
            node_thresholds.push(thresholds.high);
        }
    }

    for node in index::sample(rng, node_count, adopter_count) {
        if let Some(active) = states[node].promoted() {
            states[node] = active;
        }
    }

    let state = NetworkState {
        states,
        informed: vec![HashSet::new(); node_count],
        thresholds: node_thresholds,
    };

    debug!(
        "Initialized {} nodes: {} low-threshold, {} adopters (A={}, B={})",
        node_count,
        low_count,
        adopter_count,
        state.active_a(),
        state.active_b()
    );

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn default_split() -> PopulationSplit {
        PopulationSplit::from_low_share(0.2)
    }

    #[test]
    fn test_threshold_assignment_by_index() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let state = initialize(10, 0.0, ThresholdPair::new(1, 4), default_split(), &mut rng).unwrap();

        assert_eq!(state.thresholds, vec![1, 1, 4, 4, 4, 4, 4, 4, 4, 4]);
        assert_eq!(state.states[1], NodeState::Susceptible(ThresholdClass::Low));
        assert_eq!(state.states[2], NodeState::Susceptible(ThresholdClass::High));
        assert!(state.informed.iter().all(HashSet::is_empty));
    }

    #[test]
    fn test_adopters_sampled_without_replacement() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let state = initialize(10, 0.2, ThresholdPair::new(1, 1), default_split(), &mut rng).unwrap();

        let counts = state.counts();
        assert_eq!(counts.active(), 2);
        assert_eq!(counts.susceptible(), 8);
        assert_eq!(state.active_a() + state.active_b(), 2);
    }

    #[test]
    fn test_adopter_variant_matches_class() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let state = initialize(1000, 0.3, ThresholdPair::new(1, 4), default_split(), &mut rng).unwrap();

        for (node, s) in state.states.iter().enumerate() {
            match s {
                NodeState::Active(Variant::A) => assert!(node < 200),
                NodeState::Active(Variant::B) => assert!(node >= 200),
                _ => {}
            }
        }
        assert_eq!(state.counts().active(), 300);
    }

    #[test]
    fn test_floor_truncation() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        // 7 * 0.2 = 1.4 low nodes, 7 * 0.5 = 3.5 adopters
        let state = initialize(7, 0.5, ThresholdPair::new(1, 4), default_split(), &mut rng).unwrap();

        assert_eq!(state.thresholds.iter().filter(|&&t| t == 1).count(), 1);
        assert_eq!(state.counts().active(), 3);
    }

    #[test]
    fn test_rejects_bad_rho0() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(initialize(10, 1.5, ThresholdPair::default(), default_split(), &mut rng).is_err());
    }

    #[test]
    fn test_deterministic_under_seed() {
        let a = initialize(500, 0.1, ThresholdPair::default(), default_split(), &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        let b = initialize(500, 0.1, ThresholdPair::default(), default_split(), &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        assert_eq!(a.states, b.states);
    }
}
