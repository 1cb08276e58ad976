//! Common types for the SAR environment abstraction.

/// Identifier of a node in a contact graph.
///
/// Nodes are dense indices `0..node_count`, so per-node state lives in plain
/// vectors indexed by `NodeId`.
pub type NodeId = usize;
