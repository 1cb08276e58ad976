//! Contact networks for the agent-based engine.
//!
//! Adjacency is stored in compressed form: `offsets[v]..offsets[v + 1]` is
//! the slice of `targets` holding the neighbors of `v`. Every undirected edge
//! appears twice, once from each endpoint.

use rand::Rng;
use sar_core::{CoreError, DegreeDistribution};
use sar_env::{ContactGraph, EnvError, NodeId};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Undirected contact network in compressed adjacency form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactNetwork {
    offsets: Vec<usize>,
    targets: Vec<NodeId>,
}

impl ContactNetwork {
    /// Builds a network from an undirected edge list.
    ///
    /// Each pair is listed once. Neighbor order follows edge order.
    ///
    /// # Errors
    /// * `NodeOutOfRange` - an endpoint is `>= node_count`
    /// * `InvalidTopology` - an edge is a self loop
    pub fn from_edges(node_count: usize, edges: &[(NodeId, NodeId)]) -> Result<Self, EnvError> {
        let mut degrees = vec![0usize; node_count];
        for &(u, v) in edges {
            for node in [u, v] {
                if node >= node_count {
                    return Err(EnvError::out_of_range(node, node_count));
                }
            }
            if u == v {
                return Err(EnvError::topology(format!("self loop on node {}", u)));
            }
            degrees[u] += 1;
            degrees[v] += 1;
        }

        Ok(Self::build(node_count, &degrees, edges))
    }

    /// Lays out validated edges; `degrees[v]` must match the edge list.
    fn build(node_count: usize, degrees: &[usize], edges: &[(NodeId, NodeId)]) -> Self {
        let mut offsets = Vec::with_capacity(node_count + 1);
        offsets.push(0);
        for d in degrees {
            offsets.push(offsets[offsets.len() - 1] + d);
        }

        let mut cursor = offsets[..node_count].to_vec();
        let mut targets = vec![0; 2 * edges.len()];
        for &(u, v) in edges {
            targets[cursor[u]] = v;
            cursor[u] += 1;
            targets[cursor[v]] = u;
            cursor[v] += 1;
        }

        Self { offsets, targets }
    }

    /// Erdős–Rényi G(n, m) graph with m = ⌊n·mean_degree/2⌋ distinct edges.
    ///
    /// Edges are drawn uniformly, rejecting self loops and repeats.
    pub fn erdos_renyi<R: Rng + ?Sized>(rng: &mut R, node_count: usize, mean_degree: f64) -> Result<Self, EnvError> {
        if !mean_degree.is_finite() || mean_degree < 0.0 {
            return Err(EnvError::topology(format!("mean degree must be >= 0, got {}", mean_degree)));
        }

        let edge_target = (node_count as f64 * mean_degree / 2.0).floor() as usize;
        let max_edges = node_count * node_count.saturating_sub(1) / 2;
        if edge_target > max_edges {
            return Err(EnvError::topology(format!(
                "{} edges requested but only {} node pairs exist",
                edge_target, max_edges
            )));
        }

        let mut selected: HashSet<(NodeId, NodeId)> = HashSet::with_capacity(edge_target);
        let mut edges = Vec::with_capacity(edge_target);
        while edges.len() < edge_target {
            let u = rng.gen_range(0..node_count);
            let v = rng.gen_range(0..node_count);
            if u == v {
                continue;
            }
            if selected.insert((u.min(v), u.max(v))) {
                edges.push((u, v));
            }
        }

        Self::from_edges(node_count, &edges)
    }

    /// Erdős–Rényi graph regenerated until it is connected.
    ///
    /// # Errors
    /// `Disconnected(max_attempts)` if every attempt left isolated components.
    pub fn connected_erdos_renyi<R: Rng + ?Sized>(
        rng: &mut R,
        node_count: usize,
        mean_degree: f64,
        max_attempts: usize,
    ) -> Result<Self, EnvError> {
        for attempt in 1..=max_attempts {
            let network = Self::erdos_renyi(rng, node_count, mean_degree)?;
            if network.is_connected() {
                if attempt > 1 {
                    debug!("Connected ER graph after {} attempts", attempt);
                }
                return Ok(network);
            }
        }
        Err(EnvError::Disconnected(max_attempts))
    }

    /// `rows × cols` lattice with the 8-neighborhood (Moore) stencil.
    pub fn grid(rows: usize, cols: usize) -> Self {
        let mut edges = Vec::new();

        for row in 0..rows {
            for col in 0..cols {
                let idx = row * cols + col;

                // Forward half of the stencil so each edge is listed once
                for (dr, dc) in [(0i64, 1i64), (1, -1), (1, 0), (1, 1)] {
                    let nr = row as i64 + dr;
                    let nc = col as i64 + dc;

                    if nr >= 0 && nr < rows as i64 && nc >= 0 && nc < cols as i64 {
                        edges.push((idx, nr as usize * cols + nc as usize));
                    }
                }
            }
        }

        let mut degrees = vec![0usize; rows * cols];
        for &(u, v) in &edges {
            degrees[u] += 1;
            degrees[v] += 1;
        }
        Self::build(rows * cols, &degrees, &edges)
    }

    /// True if every node is reachable from the first node with an edge.
    ///
    /// A graph without edges counts as disconnected.
    pub fn is_connected(&self) -> bool {
        let n = self.node_count();
        let Some(start) = (0..n).find(|&v| self.degree(v) > 0) else {
            return false;
        };

        let mut visited = vec![false; n];
        let mut queue = VecDeque::from([start]);
        visited[start] = true;
        let mut reached = 1;

        while let Some(current) = queue.pop_front() {
            for &neighbor in self.neighbors(current) {
                if !visited[neighbor] {
                    visited[neighbor] = true;
                    reached += 1;
                    queue.push_back(neighbor);
                }
            }
        }

        reached == n
    }

    /// Degree of every node.
    pub fn degrees(&self) -> Vec<usize> {
        self.offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Empirical degree distribution, for driving the mean-field model
    /// with the same network the agents live on.
    pub fn degree_distribution(&self) -> Result<DegreeDistribution, CoreError> {
        DegreeDistribution::from_degrees(&self.degrees())
    }
}

impl ContactGraph for ContactNetwork {
    fn node_count(&self) -> usize {
        self.offsets.len() - 1
    }

    fn neighbors(&self, node: NodeId) -> &[NodeId] {
        &self.targets[self.offsets[node]..self.offsets[node + 1]]
    }

    fn edge_count(&self) -> usize {
        self.targets.len() / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_from_edges_adjacency() {
        let net = ContactNetwork::from_edges(4, &[(0, 1), (1, 2), (2, 0)]).unwrap();

        assert_eq!(net.node_count(), 4);
        assert_eq!(net.edge_count(), 3);
        assert_eq!(net.neighbors(0), &[1, 2]);
        assert_eq!(net.neighbors(2), &[1, 0]);
        assert!(net.neighbors(3).is_empty());
        assert!(!net.is_connected());
    }

    #[test]
    fn test_from_edges_rejects_bad_edges() {
        assert!(matches!(
            ContactNetwork::from_edges(3, &[(0, 3)]),
            Err(EnvError::NodeOutOfRange { node: 3, node_count: 3 })
        ));
        assert!(matches!(
            ContactNetwork::from_edges(3, &[(1, 1)]),
            Err(EnvError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_grid_neighborhood() {
        let net = ContactNetwork::grid(3, 3);

        // Center (1,1) = index 4 has 8 neighbors
        assert_eq!(net.degree(4), 8);
        // Corner (0,0) has 3
        assert_eq!(net.degree(0), 3);
        // Edge (0,1) has 5
        assert_eq!(net.degree(1), 5);
        assert!(net.is_connected());
    }

    #[test]
    fn test_erdos_renyi_edge_count_and_simple() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let net = ContactNetwork::erdos_renyi(&mut rng, 500, 6.0).unwrap();

        assert_eq!(net.edge_count(), 1500);
        assert_relative_eq!(net.mean_degree(), 6.0);
        for v in 0..net.node_count() {
            let nbrs = net.neighbors(v);
            assert!(!nbrs.contains(&v));
            let unique: HashSet<_> = nbrs.iter().collect();
            assert_eq!(unique.len(), nbrs.len());
        }
    }

    #[test]
    fn test_erdos_renyi_deterministic() {
        let a = ContactNetwork::erdos_renyi(&mut ChaCha8Rng::seed_from_u64(9), 200, 4.0).unwrap();
        let b = ContactNetwork::erdos_renyi(&mut ChaCha8Rng::seed_from_u64(9), 200, 4.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_erdos_renyi_too_dense() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(ContactNetwork::erdos_renyi(&mut rng, 4, 10.0).is_err());
    }

    #[test]
    fn test_connected_erdos_renyi() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let net = ContactNetwork::connected_erdos_renyi(&mut rng, 300, 10.0, 50).unwrap();
        assert!(net.is_connected());

        // Mean degree 0.5 on 300 nodes is never connected
        let result = ContactNetwork::connected_erdos_renyi(&mut rng, 300, 0.5, 3);
        assert!(matches!(result, Err(EnvError::Disconnected(3))));
    }

    #[test]
    fn test_degree_distribution() {
        // Star on 4 nodes: one hub of degree 3, three leaves of degree 1
        let net = ContactNetwork::from_edges(4, &[(0, 1), (0, 2), (0, 3)]).unwrap();
        let pk = net.degree_distribution().unwrap();

        assert_relative_eq!(pk.mass(1).unwrap(), 0.75);
        assert_relative_eq!(pk.mass(3).unwrap(), 0.25);
        assert_relative_eq!(pk.mean_degree(), net.mean_degree());
    }
}
