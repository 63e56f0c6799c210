//! Per-node simulation state

use crate::chain::{Block, BlockTree, InsertOutcome, Transaction};
use crate::consensus::{self, ForkChoice, LongestChain};
use crate::latency::Speed;
use crate::types::{BlockId, Coins, NodeId, SimTime, TxId};
use indexmap::IndexMap;
use std::collections::BTreeSet;

/// One participant of the simulated network
///
/// Each node owns its own copy of every block and transaction it has seen;
/// its view is authoritative only for itself.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    balance: Coins,
    speed: Speed,
    peers: BTreeSet<NodeId>,
    transactions: IndexMap<TxId, Transaction>,
    blocks: BlockTree,
    chain_extensions: Vec<SimTime>,
}

impl Node {
    pub fn new(id: NodeId, balance: Coins, speed: Speed) -> Self {
        Self {
            id,
            balance,
            speed,
            peers: BTreeSet::new(),
            transactions: IndexMap::new(),
            blocks: BlockTree::new(),
            chain_extensions: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn balance(&self) -> Coins {
        self.balance
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    pub fn peers(&self) -> &BTreeSet<NodeId> {
        &self.peers
    }

    /// Every transaction this node has seen, by id
    pub fn transactions(&self) -> &IndexMap<TxId, Transaction> {
        &self.transactions
    }

    pub fn has_seen(&self, txn: TxId) -> bool {
        self.transactions.contains_key(&txn)
    }

    /// This node's local block tree
    pub fn blocks(&self) -> &BlockTree {
        &self.blocks
    }

    /// Times at which this node accepted a block from a peer
    pub fn chain_extensions(&self) -> &[SimTime] {
        &self.chain_extensions
    }

    /// Whether a block was accepted strictly after `since`
    pub fn extended_after(&self, since: SimTime) -> bool {
        self.chain_extensions.iter().any(|&t| t > since)
    }

    /// Blocks of the current longest chain, tip first
    pub fn longest_chain(&self) -> Vec<&Block> {
        consensus::longest_chain(&LongestChain, &self.blocks)
    }

    /// Id of the current longest-chain tip
    pub fn tip_id(&self) -> BlockId {
        LongestChain.select_tip(&self.blocks)
    }

    /// Current tip of the longest chain
    pub fn tip(&self) -> Option<&Block> {
        self.blocks.get(self.tip_id())
    }

    /// Seen transactions not yet confirmed on the longest chain
    pub fn unconfirmed_transactions(&self) -> IndexMap<TxId, Transaction> {
        consensus::unconfirmed_transactions(&self.blocks, self.tip_id(), &self.transactions)
    }

    pub(crate) fn set_peers(&mut self, peers: BTreeSet<NodeId>) {
        self.peers = peers;
    }

    pub(crate) fn credit(&mut self, amount: Coins) {
        self.balance += amount;
    }

    pub(crate) fn debit(&mut self, amount: Coins) {
        debug_assert!(amount <= self.balance);
        self.balance -= amount;
    }

    /// Record a transaction; returns false if it was already seen
    pub(crate) fn observe(&mut self, txn: Transaction) -> bool {
        if self.transactions.contains_key(&txn.id) {
            return false;
        }
        self.transactions.insert(txn.id, txn);
        true
    }

    pub(crate) fn append_block(&mut self, block: Block) -> InsertOutcome {
        self.blocks.insert(block)
    }

    pub(crate) fn record_extension(&mut self, at: SimTime) {
        self.chain_extensions.push(at);
    }

    /// Discard every block off the longest chain
    pub(crate) fn prune(&mut self) {
        consensus::prune_to_longest(&LongestChain, &mut self.blocks);
    }
}
