//! Node labels for the agent-based engine.
//!
//! A node moves strictly forward through
//! `Susceptible(class) -> Active(variant) -> Recovered(variant)`.
//! The variant is fixed at promotion by the node's threshold class:
//! low-threshold nodes adopt A, high-threshold nodes adopt B.

use serde::{Deserialize, Serialize};

/// Which of the two thresholds a node was assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThresholdClass {
    Low,
    High,
}

impl ThresholdClass {
    /// Variant a node of this class adopts.
    pub fn variant(self) -> Variant {
        match self {
            ThresholdClass::Low => Variant::A,
            ThresholdClass::High => Variant::B,
        }
    }
}

/// Adoption variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    A,
    B,
}

/// Label of a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    Susceptible(ThresholdClass),
    Active(Variant),
    Recovered(Variant),
}

impl NodeState {
    /// Label index in `0..6`: S-low, S-high, A-a, A-b, R-a, R-b.
    ///
    /// The index never decreases along a node's history.
    pub fn index(self) -> usize {
        match self {
            NodeState::Susceptible(ThresholdClass::Low) => 0,
            NodeState::Susceptible(ThresholdClass::High) => 1,
            NodeState::Active(Variant::A) => 2,
            NodeState::Active(Variant::B) => 3,
            NodeState::Recovered(Variant::A) => 4,
            NodeState::Recovered(Variant::B) => 5,
        }
    }

    /// Short label used in logs and exports.
    pub fn label(self) -> &'static str {
        match self {
            NodeState::Susceptible(ThresholdClass::Low) => "S_low",
            NodeState::Susceptible(ThresholdClass::High) => "S_high",
            NodeState::Active(Variant::A) => "A_a",
            NodeState::Active(Variant::B) => "A_b",
            NodeState::Recovered(Variant::A) => "R_a",
            NodeState::Recovered(Variant::B) => "R_b",
        }
    }

    pub fn is_susceptible(self) -> bool {
        matches!(self, NodeState::Susceptible(_))
    }

    pub fn is_active(self) -> bool {
        matches!(self, NodeState::Active(_))
    }

    /// Susceptible -> Active of the class's variant; `None` otherwise.
    pub fn promoted(self) -> Option<NodeState> {
        match self {
            NodeState::Susceptible(class) => Some(NodeState::Active(class.variant())),
            _ => None,
        }
    }

    /// Active -> Recovered of the same variant; `None` otherwise.
    pub fn recovered(self) -> Option<NodeState> {
        match self {
            NodeState::Active(variant) => Some(NodeState::Recovered(variant)),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Head count per label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub susceptible_low: usize,
    pub susceptible_high: usize,
    pub active_a: usize,
    pub active_b: usize,
    pub recovered_a: usize,
    pub recovered_b: usize,
}

impl StateCounts {
    /// Tallies a slice of node labels.
    pub fn from_states(states: &[NodeState]) -> Self {
        let mut counts = Self::default();
        for state in states {
            match state {
                NodeState::Susceptible(ThresholdClass::Low) => counts.susceptible_low += 1,
                NodeState::Susceptible(ThresholdClass::High) => counts.susceptible_high += 1,
                NodeState::Active(Variant::A) => counts.active_a += 1,
                NodeState::Active(Variant::B) => counts.active_b += 1,
                NodeState::Recovered(Variant::A) => counts.recovered_a += 1,
                NodeState::Recovered(Variant::B) => counts.recovered_b += 1,
            }
        }
        counts
    }

    pub fn susceptible(&self) -> usize {
        self.susceptible_low + self.susceptible_high
    }

    pub fn active(&self) -> usize {
        self.active_a + self.active_b
    }

    pub fn recovered(&self) -> usize {
        self.recovered_a + self.recovered_b
    }

    /// Sum over all six labels.
    pub fn total(&self) -> usize {
        self.susceptible() + self.active() + self.recovered()
    }
}
