//! Serializable end-of-run snapshot

use crate::chain::BlockTree;
use crate::event::EventCounts;
use crate::latency::Speed;
use crate::simulator::Simulator;
use crate::types::{BlockId, Coins, NodeId, SimTime};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Per-node summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeReport {
    pub id: NodeId,
    pub speed: Speed,
    pub balance: Coins,
    pub peers: Vec<NodeId>,
    pub transactions_seen: usize,
    pub blocks_in_tree: usize,
    pub tip: BlockId,
    pub chain_length: u64,
    /// Blocks on this node's longest chain that it mined itself
    pub own_blocks_on_chain: usize,
    /// Parent -> child links of the node's block tree, sorted
    pub edges: Vec<(BlockId, BlockId)>,
}

impl NodeReport {
    /// Graphviz rendering of the block tree
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph G {\n\n");
        for (parent, child) in &self.edges {
            let _ = writeln!(dot, "\t{} -> {}", parent.0, child.0);
        }
        dot.push_str("\n}\n");
        dot
    }

    /// File name used by [`SimulationReport::write_dot`]
    pub fn dot_file_name(&self, pruned: bool) -> String {
        let suffix = if pruned { "_pruned" } else { "" };
        format!("{}_{}{}.dot", self.id.index(), self.speed, suffix)
    }
}

/// Network-wide summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub virtual_time: SimTime,
    pub total_supply: Coins,
    pub pending_events: usize,
    pub counts: EventCounts,
    pub nodes: Vec<NodeReport>,
}

impl SimulationReport {
    pub fn from_simulator(sim: &Simulator) -> Self {
        let nodes = sim
            .nodes()
            .iter()
            .map(|node| {
                let chain = node.longest_chain();
                let (tip, chain_length) = chain
                    .first()
                    .map(|b| (b.id, b.length))
                    .unwrap_or((BlockId::GENESIS, 0));
                NodeReport {
                    id: node.id(),
                    speed: node.speed(),
                    balance: node.balance(),
                    peers: node.peers().iter().copied().collect(),
                    transactions_seen: node.transactions().len(),
                    blocks_in_tree: node.blocks().len(),
                    tip,
                    chain_length,
                    own_blocks_on_chain: chain
                        .iter()
                        .filter(|b| b.creator == Some(node.id()))
                        .count(),
                    edges: tree_edges(node.blocks()),
                }
            })
            .collect();

        Self {
            virtual_time: sim.now(),
            total_supply: sim.total_supply(),
            pending_events: sim.pending_events(),
            counts: sim.counts(),
            nodes,
        }
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write one Graphviz file per node into `dir`, returning the paths written
    pub fn write_dot(&self, dir: impl AsRef<Path>, pruned: bool) -> crate::Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let mut written = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let path = dir.join(node.dot_file_name(pruned));
            fs::write(&path, node.to_dot())?;
            written.push(path);
        }
        Ok(written)
    }
}

fn tree_edges(tree: &BlockTree) -> Vec<(BlockId, BlockId)> {
    let mut edges: Vec<_> = tree
        .as_map()
        .values()
        .filter_map(|block| block.parent.map(|parent| (parent, block.id)))
        .collect();
    edges.sort();
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_report(edges: Vec<(BlockId, BlockId)>) -> NodeReport {
        NodeReport {
            id: NodeId(3),
            speed: Speed::Slow,
            balance: 20,
            peers: vec![NodeId(2), NodeId(4)],
            transactions_seen: 0,
            blocks_in_tree: edges.len() + 1,
            tip: BlockId(2),
            chain_length: 2,
            own_blocks_on_chain: 0,
            edges,
        }
    }

    #[test]
    fn test_dot_lists_parent_child_edges() {
        let report = node_report(vec![(BlockId(0), BlockId(1)), (BlockId(1), BlockId(2))]);
        assert_eq!(report.to_dot(), "digraph G {\n\n\t0 -> 1\n\t1 -> 2\n\n}\n");
        assert_eq!(report.dot_file_name(false), "3_slow.dot");
        assert_eq!(report.dot_file_name(true), "3_slow_pruned.dot");
    }

    #[test]
    fn test_genesis_only_tree_has_no_edges() {
        assert!(tree_edges(&BlockTree::new()).is_empty());
        assert_eq!(node_report(Vec::new()).to_dot(), "digraph G {\n\n\n}\n");
    }
}
