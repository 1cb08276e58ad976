//! Error types for the SAR environment abstraction.

use thiserror::Error;

/// Errors that can occur while building or querying a contact graph.
#[derive(Debug, Error)]
pub enum EnvError {
    /// An edge or query referenced a node outside `0..node_count`
    #[error("Node {node} out of range (graph has {node_count} nodes)")]
    NodeOutOfRange { node: usize, node_count: usize },
    
    /// Requested topology cannot be built (e.g. more edges than node pairs)
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),
    
    /// No connected random graph was produced within the attempt budget
    #[error("Graph still disconnected after {0} attempts")]
    Disconnected(usize),
}

impl EnvError {
    /// Creates an out-of-range error.
    pub fn out_of_range(node: usize, node_count: usize) -> Self {
        Self::NodeOutOfRange { node, node_count }
    }
    
    /// Creates an invalid topology error.
    pub fn topology(msg: impl Into<String>) -> Self {
        Self::InvalidTopology(msg.into())
    }
}
