//! Blocks, transactions and the per-node block tree

use crate::types::{BlockId, Coins, NodeId, SimTime, TxId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A coin transfer between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    pub sender: NodeId,
    pub receiver: NodeId,
    pub amount: Coins,
}

impl Transaction {
    pub fn new(id: TxId, sender: NodeId, receiver: NodeId, amount: Coins) -> Self {
        Self {
            id,
            sender,
            receiver,
            amount,
        }
    }
}

/// A block as held in one node's tree
///
/// `parent` is `None` only for genesis. `length` is the depth from genesis and
/// is always computed by the node holding the copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub created_at: SimTime,
    pub creator: Option<NodeId>,
    pub parent: Option<BlockId>,
    pub length: u64,
    pub transactions: IndexMap<TxId, Transaction>,
}

impl Block {
    /// The shared root every node starts from
    pub fn genesis() -> Self {
        Self {
            id: BlockId::GENESIS,
            created_at: 0.0,
            creator: None,
            parent: None,
            length: 0,
            transactions: IndexMap::new(),
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.parent.is_none()
    }

    /// Parent id with `-1` standing in for the genesis block's missing parent
    pub fn parent_id_or_sentinel(&self) -> i64 {
        self.parent.map(|p| p.0 as i64).unwrap_or(-1)
    }
}

/// Why a block was not added to a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
    Orphan,
}

/// Arena of blocks keyed by id, rooted at genesis
///
/// Blocks are only ever appended; a block is accepted once its parent is
/// present. [`BlockTree::retain_ids`] is the one removal path and is used for
/// pruning before reporting.
#[derive(Debug, Clone)]
pub struct BlockTree {
    blocks: HashMap<BlockId, Block>,
}

impl Default for BlockTree {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockTree {
    /// A tree holding only the genesis block
    pub fn new() -> Self {
        let mut blocks = HashMap::new();
        blocks.insert(BlockId::GENESIS, Block::genesis());
        Self { blocks }
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.blocks.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All blocks, in no particular order
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// Full id -> block mapping
    pub fn as_map(&self) -> &HashMap<BlockId, Block> {
        &self.blocks
    }

    /// Append a copy of `block`, recomputing its length from the local parent
    pub fn insert(&mut self, mut block: Block) -> InsertOutcome {
        if self.blocks.contains_key(&block.id) {
            return InsertOutcome::Duplicate;
        }

        let parent_length = match block.parent.and_then(|p| self.blocks.get(&p)) {
            Some(parent) => parent.length,
            None => return InsertOutcome::Orphan,
        };

        block.length = parent_length + 1;
        self.blocks.insert(block.id, block);
        InsertOutcome::Inserted
    }

    /// Walk from `tip` back to genesis via parent ids
    pub fn ancestry(&self, tip: BlockId) -> Ancestry<'_> {
        Ancestry {
            tree: self,
            next: Some(tip),
        }
    }

    /// Keep only the blocks whose ids satisfy `keep`
    pub(crate) fn retain_ids(&mut self, mut keep: impl FnMut(BlockId) -> bool) {
        self.blocks.retain(|id, _| keep(*id));
    }
}

/// Iterator over a chain, tip first
pub struct Ancestry<'a> {
    tree: &'a BlockTree,
    next: Option<BlockId>,
}

impl<'a> Iterator for Ancestry<'a> {
    type Item = &'a Block;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.tree.get(self.next?)?;
        self.next = block.parent;
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(id: u64, parent: u64, created_at: SimTime) -> Block {
        Block {
            id: BlockId(id),
            created_at,
            creator: Some(NodeId(0)),
            parent: Some(BlockId(parent)),
            // deliberately wrong: the tree recomputes it
            length: 99,
            transactions: IndexMap::new(),
        }
    }

    #[test]
    fn test_new_tree_holds_genesis() {
        let tree = BlockTree::new();
        let genesis = tree.get(BlockId::GENESIS).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(genesis.length, 0);
        assert_eq!(genesis.parent_id_or_sentinel(), -1);
        assert!(genesis.is_genesis());
    }

    #[test]
    fn test_insert_recomputes_length() {
        let mut tree = BlockTree::new();
        assert_eq!(tree.insert(child(1, 0, 1.0)), InsertOutcome::Inserted);
        assert_eq!(tree.insert(child(2, 1, 2.0)), InsertOutcome::Inserted);
        assert_eq!(tree.get(BlockId(1)).unwrap().length, 1);
        assert_eq!(tree.get(BlockId(2)).unwrap().length, 2);
    }

    #[test]
    fn test_insert_rejects_orphans_and_duplicates() {
        let mut tree = BlockTree::new();
        assert_eq!(tree.insert(child(5, 4, 1.0)), InsertOutcome::Orphan);
        assert!(!tree.contains(BlockId(5)));

        assert_eq!(tree.insert(child(1, 0, 1.0)), InsertOutcome::Inserted);
        let mut again = child(1, 0, 3.0);
        again.creator = Some(NodeId(3));
        assert_eq!(tree.insert(again), InsertOutcome::Duplicate);
        assert_eq!(tree.get(BlockId(1)).unwrap().created_at, 1.0);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_ancestry_walks_to_genesis() {
        let mut tree = BlockTree::new();
        tree.insert(child(1, 0, 1.0));
        tree.insert(child(2, 1, 2.0));
        tree.insert(child(3, 1, 2.5));

        let ids: Vec<u64> = tree.ancestry(BlockId(3)).map(|b| b.id.0).collect();
        assert_eq!(ids, vec![3, 1, 0]);
    }
}
