//! Simulation events and their state transitions
//!
//! Every event runs exactly once, atomically, when the scheduler pops it. A
//! transition mutates the simulator and returns the follow-up events it
//! wants scheduled. Superseded work is never cancelled; the receive and
//! mining transitions guard themselves instead.

use crate::chain::{Block, Transaction};
use crate::config::StaleMiningPolicy;
use crate::error::Result;
use crate::latency::MessageKind;
use crate::simulator::Simulator;
use crate::types::{NodeId, SimTime};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, trace};

/// What happens when an event fires
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// The node pays a random peer and floods the transaction
    TransactionGenerate,
    /// A transaction arrives over a link
    TransactionReceive { txn: Transaction, from: NodeId },
    /// The node attempts to mine on its longest chain
    BlockGenerate,
    /// A block arrives over a link
    BlockReceive { block: Block, from: NodeId },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::TransactionGenerate => "transaction_generate",
            EventKind::TransactionReceive { .. } => "transaction_receive",
            EventKind::BlockGenerate => "block_generate",
            EventKind::BlockReceive { .. } => "block_receive",
        }
    }
}

/// An event bound to the node it runs on
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Node the event runs on
    pub node: NodeId,
    /// Virtual time at which the event was scheduled
    pub created_at: SimTime,
    /// Virtual time at which the event runs
    pub run_at: SimTime,
    pub kind: EventKind,
}

impl Event {
    pub fn new(node: NodeId, created_at: SimTime, run_at: SimTime, kind: EventKind) -> Self {
        Self {
            node,
            created_at,
            run_at,
            kind,
        }
    }

    /// Apply this event to the simulator, returning follow-up events
    pub fn apply(self, sim: &mut Simulator) -> Result<Vec<Event>> {
        trace!(node = %self.node, at = self.run_at, kind = self.kind.name(), "applying event");
        sim.counts_mut().record(&self.kind);

        let Event {
            node,
            created_at,
            run_at,
            kind,
        } = self;

        match kind {
            EventKind::TransactionGenerate => generate_transaction(sim, node, run_at),
            EventKind::TransactionReceive { txn, .. } => {
                receive_transaction(sim, node, run_at, txn)
            },
            EventKind::BlockGenerate => generate_block(sim, node, created_at, run_at),
            EventKind::BlockReceive { block, .. } => receive_block(sim, node, run_at, block),
        }
    }
}

fn generate_transaction(sim: &mut Simulator, node: NodeId, now: SimTime) -> Result<Vec<Event>> {
    let node_count = sim.nodes().len();
    let receiver = {
        let pick = sim.rng().gen_range(0..node_count - 1);
        NodeId(if pick >= node.index() { pick + 1 } else { pick })
    };

    let balance = sim.node(node)?.balance();
    let amount = sim.rng().gen_range(0..=balance);
    let txn = sim.transfer(node, receiver, amount)?;

    let mut events = vec![Event::new(
        node,
        now,
        now + sim.next_transaction_delay(),
        EventKind::TransactionGenerate,
    )];
    events.extend(sim.broadcast(node, now, MessageKind::Transaction, None, || {
        EventKind::TransactionReceive {
            txn: txn.clone(),
            from: node,
        }
    })?);

    Ok(events)
}

fn receive_transaction(
    sim: &mut Simulator,
    node: NodeId,
    now: SimTime,
    txn: Transaction,
) -> Result<Vec<Event>> {
    if !sim.node_mut(node)?.observe(txn.clone()) {
        sim.counts_mut().duplicate_transactions += 1;
        return Ok(Vec::new());
    }

    sim.broadcast(node, now, MessageKind::Transaction, None, || {
        EventKind::TransactionReceive {
            txn: txn.clone(),
            from: node,
        }
    })
}

fn generate_block(
    sim: &mut Simulator,
    node: NodeId,
    created_at: SimTime,
    now: SimTime,
) -> Result<Vec<Event>> {
    let policy = sim.config().stale_mining;
    let allow_empty = sim.config().allow_empty_blocks;
    let reward = sim.config().mining_reward;

    let (tip, pending) = {
        let state = sim.node(node)?;
        if policy == StaleMiningPolicy::AbandonIfSuperseded && state.extended_after(created_at) {
            debug!(%node, scheduled = created_at, "abandoning superseded mining attempt");
            sim.counts_mut().stale_mining_attempts += 1;
            return Ok(Vec::new());
        }
        (state.tip_id(), state.unconfirmed_transactions())
    };

    if pending.is_empty() && !allow_empty {
        debug!(%node, "nothing to confirm, retrying mining later");
        sim.counts_mut().empty_block_skips += 1;
        return Ok(vec![Event::new(
            node,
            now,
            now + sim.next_block_delay(),
            EventKind::BlockGenerate,
        )]);
    }

    let block = Block {
        id: sim.fresh_block_id(),
        created_at: now,
        creator: Some(node),
        parent: Some(tip),
        length: 0,
        transactions: pending,
    };

    let miner = sim.node_mut(node)?;
    miner.append_block(block.clone());
    miner.credit(reward);
    let block = miner.blocks().get(block.id).cloned().unwrap_or(block);
    debug!(
        %node,
        block = %block.id,
        parent = %tip,
        length = block.length,
        txns = block.transactions.len(),
        "mined block"
    );

    sim.broadcast(node, now, MessageKind::Block, None, || EventKind::BlockReceive {
        block: block.clone(),
        from: node,
    })
}

fn receive_block(
    sim: &mut Simulator,
    node: NodeId,
    now: SimTime,
    block: Block,
) -> Result<Vec<Event>> {
    let state = sim.node_mut(node)?;

    if state.blocks().contains(block.id) {
        sim.counts_mut().duplicate_blocks += 1;
        return Ok(Vec::new());
    }

    let parent_known = block.parent.map_or(false, |p| state.blocks().contains(p));
    if !parent_known {
        debug!(
            %node,
            block = %block.id,
            parent = block.parent_id_or_sentinel(),
            "dropping orphan block"
        );
        sim.counts_mut().orphan_blocks += 1;
        return Ok(Vec::new());
    }

    for txn in block.transactions.values() {
        state.observe(txn.clone());
    }
    state.append_block(block.clone());
    state.record_extension(now);
    let block = state.blocks().get(block.id).cloned().unwrap_or(block);

    let mut events = sim.broadcast(node, now, MessageKind::Block, block.creator, || {
        EventKind::BlockReceive {
            block: block.clone(),
            from: node,
        }
    })?;
    events.push(Event::new(
        node,
        now,
        now + sim.next_block_delay(),
        EventKind::BlockGenerate,
    ));

    Ok(events)
}

/// Tally of processed events and of guard outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventCounts {
    pub transaction_generate: u64,
    pub transaction_receive: u64,
    pub block_generate: u64,
    pub block_receive: u64,
    /// Transactions delivered to a node that had already seen them
    pub duplicate_transactions: u64,
    /// Blocks delivered to a node that already held them
    pub duplicate_blocks: u64,
    /// Blocks dropped because their parent was unknown
    pub orphan_blocks: u64,
    /// Mining attempts skipped because the chain moved on
    pub stale_mining_attempts: u64,
    /// Mining attempts skipped for lack of transactions
    pub empty_block_skips: u64,
}

impl EventCounts {
    pub fn record(&mut self, kind: &EventKind) {
        match kind {
            EventKind::TransactionGenerate => self.transaction_generate += 1,
            EventKind::TransactionReceive { .. } => self.transaction_receive += 1,
            EventKind::BlockGenerate => self.block_generate += 1,
            EventKind::BlockReceive { .. } => self.block_receive += 1,
        }
    }

    /// Total number of events processed
    pub fn total(&self) -> u64 {
        self.transaction_generate
            + self.transaction_receive
            + self.block_generate
            + self.block_receive
    }

    /// Blocks actually mined: generate attempts minus the skipped ones
    pub fn blocks_mined(&self) -> u64 {
        self.block_generate - self.stale_mining_attempts - self.empty_block_skips
    }

    /// Counts accumulated since `earlier`, clamped at zero per field
    pub(crate) fn since(&self, earlier: &EventCounts) -> EventCounts {
        EventCounts {
            transaction_generate: self
                .transaction_generate
                .saturating_sub(earlier.transaction_generate),
            transaction_receive: self
                .transaction_receive
                .saturating_sub(earlier.transaction_receive),
            block_generate: self.block_generate.saturating_sub(earlier.block_generate),
            block_receive: self.block_receive.saturating_sub(earlier.block_receive),
            duplicate_transactions: self
                .duplicate_transactions
                .saturating_sub(earlier.duplicate_transactions),
            duplicate_blocks: self.duplicate_blocks.saturating_sub(earlier.duplicate_blocks),
            orphan_blocks: self.orphan_blocks.saturating_sub(earlier.orphan_blocks),
            stale_mining_attempts: self
                .stale_mining_attempts
                .saturating_sub(earlier.stale_mining_attempts),
            empty_block_skips: self.empty_block_skips.saturating_sub(earlier.empty_block_skips),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_since_snapshot() {
        let earlier = EventCounts {
            block_generate: 2,
            stale_mining_attempts: 1,
            ..Default::default()
        };
        let later = EventCounts {
            block_generate: 5,
            block_receive: 3,
            stale_mining_attempts: 1,
            ..Default::default()
        };

        let delta = later.since(&earlier);
        assert_eq!(delta.block_generate, 3);
        assert_eq!(delta.block_receive, 3);
        assert_eq!(delta.stale_mining_attempts, 0);
        assert_eq!(delta.blocks_mined(), 3);

        // reversed snapshots clamp instead of underflowing
        assert_eq!(earlier.since(&later), EventCounts::default());
    }
}
