//! Fork choice and chain queries over a node's block tree

use crate::chain::{Block, BlockTree, Transaction};
use crate::types::{BlockId, TxId};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Base trait for fork-choice rules
pub trait ForkChoice: Send + Sync {
    /// Pick the block new work should build on
    fn select_tip(&self, tree: &BlockTree) -> BlockId;
}

/// Longest chain wins; among equal lengths the earliest-created block wins
#[derive(Debug, Clone, Copy, Default)]
pub struct LongestChain;

impl LongestChain {
    fn preference(a: &Block, b: &Block) -> Ordering {
        b.length
            .cmp(&a.length)
            .then_with(|| a.created_at.total_cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    }
}

impl ForkChoice for LongestChain {
    fn select_tip(&self, tree: &BlockTree) -> BlockId {
        tree.blocks()
            .min_by(|a, b| Self::preference(a, b))
            .map(|b| b.id)
            .unwrap_or(BlockId::GENESIS)
    }
}

/// Blocks of the chain ending at the selected tip, tip first
pub fn longest_chain<'a>(rule: &impl ForkChoice, tree: &'a BlockTree) -> Vec<&'a Block> {
    tree.ancestry(rule.select_tip(tree)).collect()
}

/// Ids of every transaction included on the chain ending at `tip`
pub fn confirmed_transactions(tree: &BlockTree, tip: BlockId) -> HashSet<TxId> {
    tree.ancestry(tip)
        .flat_map(|block| block.transactions.keys().copied())
        .collect()
}

/// Seen transactions not yet included on the chain ending at `tip`, in seen order
pub fn unconfirmed_transactions(
    tree: &BlockTree,
    tip: BlockId,
    seen: &IndexMap<TxId, Transaction>,
) -> IndexMap<TxId, Transaction> {
    let confirmed = confirmed_transactions(tree, tip);
    seen.iter()
        .filter(|(id, _)| !confirmed.contains(id))
        .map(|(id, txn)| (*id, txn.clone()))
        .collect()
}

/// Drop every block that is not on the selected chain
pub fn prune_to_longest(rule: &impl ForkChoice, tree: &mut BlockTree) {
    let keep: HashSet<BlockId> = longest_chain(rule, tree).iter().map(|b| b.id).collect();
    tree.retain_ids(|id| keep.contains(&id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeId, SimTime};

    fn block(id: u64, parent: u64, created_at: SimTime, txns: &[u64]) -> Block {
        Block {
            id: BlockId(id),
            created_at,
            creator: Some(NodeId(0)),
            parent: Some(BlockId(parent)),
            length: 0,
            transactions: txns
                .iter()
                .map(|&t| (TxId(t), Transaction::new(TxId(t), NodeId(0), NodeId(1), 1)))
                .collect(),
        }
    }

    /// genesis - 1 - 2 - 3
    ///             \
    ///              4 - 5
    fn forked_tree() -> BlockTree {
        let mut tree = BlockTree::new();
        tree.insert(block(1, 0, 0.0, &[1]));
        tree.insert(block(2, 1, 0.0, &[2]));
        tree.insert(block(3, 2, 5.0, &[3]));
        tree.insert(block(4, 1, 0.0, &[4]));
        tree.insert(block(5, 4, 0.0, &[5]));
        tree
    }

    #[test]
    fn test_equal_length_prefers_earlier_block() {
        let tree = forked_tree();
        // 3 and 5 both have length 3; 5 was created first
        assert_eq!(LongestChain.select_tip(&tree), BlockId(5));

        let ids: Vec<u64> = longest_chain(&LongestChain, &tree).iter().map(|b| b.id.0).collect();
        assert_eq!(ids, vec![5, 4, 1, 0]);
    }

    #[test]
    fn test_longer_chain_beats_earlier_creation() {
        let mut tree = forked_tree();
        tree.insert(block(6, 3, 9.0, &[]));
        assert_eq!(LongestChain.select_tip(&tree), BlockId(6));
    }

    #[test]
    fn test_genesis_only_tree() {
        let tree = BlockTree::new();
        assert_eq!(LongestChain.select_tip(&tree), BlockId::GENESIS);
        assert!(confirmed_transactions(&tree, BlockId::GENESIS).is_empty());
    }

    #[test]
    fn test_unconfirmed_excludes_chain_transactions() {
        let tree = forked_tree();
        let seen: IndexMap<TxId, Transaction> = (1..=6)
            .map(|t| (TxId(t), Transaction::new(TxId(t), NodeId(0), NodeId(1), 1)))
            .collect();

        let pending = unconfirmed_transactions(&tree, BlockId(5), &seen);
        let ids: Vec<u64> = pending.keys().map(|t| t.0).collect();
        assert_eq!(ids, vec![2, 3, 6]);
    }

    #[test]
    fn test_prune_keeps_only_longest_chain() {
        let mut tree = forked_tree();
        prune_to_longest(&LongestChain, &mut tree);

        let mut ids: Vec<u64> = tree.blocks().map(|b| b.id.0).collect();
        ids.sort();
        assert_eq!(ids, vec![0, 1, 4, 5]);
        assert_eq!(tree.get(BlockId(5)).unwrap().length, 3);
    }
}
