//! Contact graph abstraction consumed by the agent-based engine.

use crate::types::NodeId;

/// Read-only view of an undirected contact network.
///
/// # Implementations
///
/// - **Generated**: `sar_sim::ContactNetwork` (Erdős–Rényi, lattice, edge list)
/// - **Tests**: any small hand-built adjacency
///
/// Nodes are the dense range `0..node_count()`. Neighbor slices must not
/// contain the node itself.
pub trait ContactGraph {
    /// Number of nodes in the graph.
    fn node_count(&self) -> usize;
    
    /// Neighbors of `node`.
    ///
    /// # Panics
    /// Implementations may panic if `node >= node_count()`.
    fn neighbors(&self, node: NodeId) -> &[NodeId];
    
    /// Degree of `node`.
    fn degree(&self, node: NodeId) -> usize {
        self.neighbors(node).len()
    }
    
    /// Number of undirected edges.
    fn edge_count(&self) -> usize {
        (0..self.node_count()).map(|v| self.degree(v)).sum::<usize>() / 2
    }
    
    /// Average degree 2|E| / |V| (0 for an empty graph).
    fn mean_degree(&self) -> f64 {
        let n = self.node_count();
        if n == 0 {
            return 0.0;
        }
        (0..n).map(|v| self.degree(v)).sum::<usize>() as f64 / n as f64
    }
}

impl ContactGraph for Vec<Vec<NodeId>> {
    fn node_count(&self) -> usize {
        self.len()
    }
    
    fn neighbors(&self, node: NodeId) -> &[NodeId] {
        &self[node]
    }
}
