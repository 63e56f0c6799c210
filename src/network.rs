//! Peer graph construction and reachability queries

use crate::config::PeerDegree;
use crate::error::{Result, SimulatorError};
use crate::types::NodeId;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

/// Undirected peer graph; every link is stored at both endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerGraph {
    adjacency: Vec<BTreeSet<NodeId>>,
}

impl PeerGraph {
    /// A graph with `node_count` nodes and no links
    pub fn empty(node_count: usize) -> Self {
        Self {
            adjacency: vec![BTreeSet::new(); node_count],
        }
    }

    /// Random graph where each node links to a sampled number of peers
    ///
    /// Components left disconnected by sampling are bridged to the
    /// component of node 0, so the result is always connected.
    pub fn random<R: Rng + ?Sized>(node_count: usize, degree: PeerDegree, rng: &mut R) -> Self {
        let mut graph = Self::empty(node_count);

        for i in 0..node_count {
            let count = rng.gen_range(degree.min..=degree.max);
            let mut others: Vec<usize> = (0..node_count).filter(|&j| j != i).collect();
            others.shuffle(rng);
            for &j in others.iter().take(count) {
                graph.link(NodeId(i), NodeId(j));
            }
        }

        graph.bridge_components(rng);
        graph
    }

    /// Graph from explicit neighbour lists; links are made symmetric
    pub fn from_adjacency(adjacency: Vec<Vec<usize>>) -> Result<Self> {
        let n = adjacency.len();
        let mut graph = Self::empty(n);
        for (i, peers) in adjacency.iter().enumerate() {
            for &j in peers {
                if j >= n || j == i {
                    return Err(SimulatorError::config(format!(
                        "invalid peer {} for node {}",
                        j, i
                    )));
                }
                graph.link(NodeId(i), NodeId(j));
            }
        }
        Ok(graph)
    }

    /// Ring of `node_count` nodes
    pub fn ring(node_count: usize) -> Self {
        let mut graph = Self::empty(node_count);
        if node_count > 1 {
            for i in 0..node_count {
                graph.link(NodeId(i), NodeId((i + 1) % node_count));
            }
        }
        graph
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of undirected links
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(BTreeSet::len).sum::<usize>() / 2
    }

    pub fn peers(&self, node: NodeId) -> Option<&BTreeSet<NodeId>> {
        self.adjacency.get(node.index())
    }

    pub fn has_link(&self, a: NodeId, b: NodeId) -> bool {
        self.peers(a).map_or(false, |p| p.contains(&b))
    }

    /// Add a symmetric link; self-links are ignored
    pub fn link(&mut self, a: NodeId, b: NodeId) {
        if a == b {
            return;
        }
        self.adjacency[a.index()].insert(b);
        self.adjacency[b.index()].insert(a);
    }

    /// Hop distances from `start`; `None` for unreachable nodes
    pub fn distances_from(&self, start: NodeId) -> Vec<Option<usize>> {
        let mut dist = vec![None; self.node_count()];
        if start.index() >= dist.len() {
            return dist;
        }

        let mut queue = VecDeque::new();
        dist[start.index()] = Some(0);
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            let d = dist[node.index()].unwrap_or(0);
            for &peer in &self.adjacency[node.index()] {
                if dist[peer.index()].is_none() {
                    dist[peer.index()] = Some(d + 1);
                    queue.push_back(peer);
                }
            }
        }

        dist
    }

    pub fn is_connected(&self) -> bool {
        self.node_count() == 0 || self.distances_from(NodeId(0)).iter().all(Option::is_some)
    }

    /// Longest shortest path in hops, or `None` if disconnected
    pub fn diameter(&self) -> Option<usize> {
        let mut diameter = 0;
        for i in 0..self.node_count() {
            for d in self.distances_from(NodeId(i)) {
                diameter = diameter.max(d?);
            }
        }
        Some(diameter)
    }

    /// Connected components, each sorted, ordered by their smallest node
    pub fn components(&self) -> Vec<Vec<NodeId>> {
        let mut assigned = vec![false; self.node_count()];
        let mut components = Vec::new();

        for i in 0..self.node_count() {
            if assigned[i] {
                continue;
            }
            let component: Vec<NodeId> = self
                .distances_from(NodeId(i))
                .iter()
                .enumerate()
                .filter(|(_, d)| d.is_some())
                .map(|(j, _)| NodeId(j))
                .collect();
            for node in &component {
                assigned[node.index()] = true;
            }
            components.push(component);
        }

        components
    }

    fn bridge_components<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let components = self.components();
        if components.len() <= 1 {
            return;
        }

        debug!(components = components.len(), "bridging disconnected peer graph");
        let main = &components[0];
        for component in &components[1..] {
            if let (Some(&a), Some(&b)) = (main.choose(rng), component.choose(rng)) {
                self.link(a, b);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn test_ring_shape() {
        let ring = PeerGraph::ring(5);
        assert_eq!(ring.edge_count(), 5);
        assert!(ring.has_link(NodeId(4), NodeId(0)));
        assert!(ring.is_connected());
        assert_eq!(ring.diameter(), Some(2));
    }

    #[test]
    fn test_components_get_bridged() {
        let mut graph = PeerGraph::from_adjacency(vec![vec![1], vec![], vec![3], vec![]]).unwrap();
        assert!(!graph.is_connected());
        assert_eq!(graph.components().len(), 2);
        assert_eq!(graph.diameter(), None);

        graph.bridge_components(&mut ChaCha12Rng::seed_from_u64(3));
        assert!(graph.is_connected());
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn test_random_graph_is_symmetric_without_self_links() {
        let mut rng = ChaCha12Rng::seed_from_u64(11);
        let graph = PeerGraph::random(12, PeerDegree::new(1, 3), &mut rng);
        for i in 0..12 {
            let node = NodeId(i);
            let peers = graph.peers(node).unwrap();
            assert!(!peers.contains(&node));
            assert!(!peers.is_empty());
            for &peer in peers {
                assert!(graph.has_link(peer, node));
            }
        }
        assert!(graph.is_connected());
    }

    #[test]
    fn test_rejects_bad_adjacency() {
        assert!(PeerGraph::from_adjacency(vec![vec![0]]).is_err());
        assert!(PeerGraph::from_adjacency(vec![vec![3], vec![]]).is_err());
    }
}
