//! Simulation driver: owns every node, the latency model and the event queue

use crate::chain::{Block, Transaction};
use crate::config::SimulationConfig;
use crate::error::{Result, SimulatorError};
use crate::event::{Event, EventCounts, EventKind};
use crate::latency::{LatencyModel, MessageKind, Speed};
use crate::network::PeerGraph;
use crate::node::Node;
use crate::report::SimulationReport;
use crate::scheduler::Scheduler;
use crate::types::{BlockId, Coins, NodeId, SimTime, TxId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use rand_distr::{Distribution, Exp};
use tracing::info;

/// When a call to [`Simulator::run`] stops
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunLimit {
    /// Process at most this many events
    Events(u64),
    /// Process every event scheduled at or before this virtual time
    Until(SimTime),
}

/// The whole simulated network
///
/// All mutable state lives here and is handed to each event transition
/// explicitly; events run one at a time, to completion, in time order.
pub struct Simulator {
    config: SimulationConfig,
    nodes: Vec<Node>,
    graph: PeerGraph,
    latency: LatencyModel,
    scheduler: Scheduler,
    rng: ChaCha12Rng,
    now: SimTime,
    next_block_id: u64,
    next_txn_id: u64,
    counts: EventCounts,
    transaction_interarrival: Exp<f64>,
    block_interarrival: Exp<f64>,
}

impl Simulator {
    /// Build a randomized network from `config` and seed its initial events
    pub fn new(config: SimulationConfig) -> Result<Self> {
        Self::builder().with_config(config).build()
    }

    /// Create a builder for a simulator
    pub fn builder() -> SimulatorBuilder {
        SimulatorBuilder::new()
    }

    /// Run until the limit is reached or the queue drains
    ///
    /// Returns the counts for this call only; the loop can be resumed.
    pub fn run(&mut self, limit: RunLimit) -> Result<EventCounts> {
        let before = self.counts;
        let mut processed = 0u64;

        loop {
            match limit {
                RunLimit::Events(max) if processed >= max => break,
                RunLimit::Until(end) if self.scheduler.peek_time().map_or(true, |t| t > end) => {
                    break
                },
                _ => {},
            }

            if !self.step()? {
                break;
            }
            processed += 1;
        }

        let counts = self.counts.since(&before);
        info!(
            events = counts.total(),
            now = self.now,
            pending = self.scheduler.len(),
            "simulation run finished"
        );
        Ok(counts)
    }

    /// Pop and apply the earliest event; false if nothing was pending
    pub fn step(&mut self) -> Result<bool> {
        match self.scheduler.pop_earliest() {
            Some(event) => {
                self.deliver(event)?;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    /// Apply one event immediately at its timestamp and queue its follow-ups
    pub fn deliver(&mut self, event: Event) -> Result<()> {
        self.check_node(event.node)?;
        if event.run_at > self.now {
            self.now = event.run_at;
        }
        let follow_ups = event.apply(self)?;
        self.scheduler.extend(follow_ups);
        Ok(())
    }

    /// Queue an event
    pub fn schedule(&mut self, event: Event) -> Result<()> {
        self.check_node(event.node)?;
        self.scheduler.schedule(event);
        Ok(())
    }

    /// Transfer `amount` from `sender` to `receiver` at time `at` and flood it
    ///
    /// The transfer and the sender's own record happen immediately; peers
    /// receive the transaction through scheduled receive events.
    pub fn inject_transaction(
        &mut self,
        sender: NodeId,
        receiver: NodeId,
        amount: Coins,
        at: SimTime,
    ) -> Result<Transaction> {
        self.check_node(receiver)?;
        let balance = self.node(sender)?.balance();
        if sender == receiver || amount > balance {
            return Err(SimulatorError::config(format!(
                "cannot transfer {} from {} (balance {}) to {}",
                amount, sender, balance, receiver
            )));
        }

        let txn = self.transfer(sender, receiver, amount)?;
        let events = self.broadcast(sender, at, MessageKind::Transaction, None, || {
            EventKind::TransactionReceive {
                txn: txn.clone(),
                from: sender,
            }
        })?;
        self.scheduler.extend(events);
        Ok(txn)
    }

    /// Discard, per node, every block off that node's longest chain
    pub fn prune_chains(&mut self) {
        for node in &mut self.nodes {
            node.prune();
        }
    }

    /// Current virtual time
    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.index()).ok_or(SimulatorError::UnknownNode(id))
    }

    /// Longest chain of `id`, tip first
    pub fn longest_chain(&self, id: NodeId) -> Result<Vec<&Block>> {
        Ok(self.node(id)?.longest_chain())
    }

    pub fn peer_graph(&self) -> &PeerGraph {
        &self.graph
    }

    pub fn latency_model(&self) -> &LatencyModel {
        &self.latency
    }

    /// Cumulative counts since the simulator was built
    pub fn counts(&self) -> EventCounts {
        self.counts
    }

    pub fn pending_events(&self) -> usize {
        self.scheduler.len()
    }

    /// Sum of all node balances
    pub fn total_supply(&self) -> Coins {
        self.nodes.iter().map(Node::balance).sum()
    }

    /// Snapshot of the network for reporting
    pub fn report(&self) -> SimulationReport {
        SimulationReport::from_simulator(self)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.index())
            .ok_or(SimulatorError::UnknownNode(id))
    }

    pub(crate) fn counts_mut(&mut self) -> &mut EventCounts {
        &mut self.counts
    }

    pub(crate) fn rng(&mut self) -> &mut ChaCha12Rng {
        &mut self.rng
    }

    pub(crate) fn fresh_block_id(&mut self) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        id
    }

    pub(crate) fn fresh_transaction_id(&mut self) -> TxId {
        let id = TxId(self.next_txn_id);
        self.next_txn_id += 1;
        id
    }

    pub(crate) fn next_transaction_delay(&mut self) -> SimTime {
        self.transaction_interarrival.sample(&mut self.rng)
    }

    pub(crate) fn next_block_delay(&mut self) -> SimTime {
        self.block_interarrival.sample(&mut self.rng)
    }

    /// Move coins and record the new transaction in the sender's seen set
    pub(crate) fn transfer(
        &mut self,
        sender: NodeId,
        receiver: NodeId,
        amount: Coins,
    ) -> Result<Transaction> {
        self.check_node(receiver)?;
        let txn = Transaction::new(self.fresh_transaction_id(), sender, receiver, amount);

        let from = self.node_mut(sender)?;
        from.debit(amount);
        from.observe(txn.clone());
        self.node_mut(receiver)?.credit(amount);

        Ok(txn)
    }

    /// One event per peer of `from` (except `exclude`), each delayed by a fresh latency draw
    pub(crate) fn broadcast(
        &mut self,
        from: NodeId,
        at: SimTime,
        kind: MessageKind,
        exclude: Option<NodeId>,
        payload: impl Fn() -> EventKind,
    ) -> Result<Vec<Event>> {
        let peers: Vec<NodeId> = self
            .node(from)?
            .peers()
            .iter()
            .copied()
            .filter(|&peer| Some(peer) != exclude)
            .collect();

        let mut events = Vec::with_capacity(peers.len());
        for peer in peers {
            let delay = self.latency.latency(from, peer, kind, &mut self.rng)?;
            events.push(Event::new(peer, at, at + delay, payload()));
        }
        Ok(events)
    }

    fn check_node(&self, id: NodeId) -> Result<()> {
        self.node(id).map(|_| ())
    }

    fn seed_events(&mut self) {
        let ids: Vec<NodeId> = self.nodes.iter().map(Node::id).collect();
        for node in ids {
            let offset = self.next_transaction_delay();
            self.scheduler
                .schedule(Event::new(node, 0.0, offset, EventKind::TransactionGenerate));
            let offset = self.next_block_delay();
            self.scheduler
                .schedule(Event::new(node, 0.0, offset, EventKind::BlockGenerate));
        }
    }
}

/// Builder for simulators
///
/// Anything not set explicitly is drawn from the configuration and the seeded RNG.
pub struct SimulatorBuilder {
    config: SimulationConfig,
    seed: Option<u64>,
    topology: Option<PeerGraph>,
    propagation: Option<Vec<Vec<SimTime>>>,
    balances: Option<Vec<Coins>>,
    speeds: Option<Vec<Speed>>,
    seed_events: bool,
}

impl SimulatorBuilder {
    /// Create a new simulator builder
    pub fn new() -> Self {
        Self {
            config: SimulationConfig::default(),
            seed: None,
            topology: None,
            propagation: None,
            balances: None,
            speeds: None,
            seed_events: true,
        }
    }

    /// Set the simulation configuration
    pub fn with_config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the configured RNG seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Use an explicit peer graph instead of a random one
    pub fn topology(mut self, graph: PeerGraph) -> Self {
        self.topology = Some(graph);
        self
    }

    /// Use an explicit propagation-delay matrix (seconds)
    pub fn propagation_delays(mut self, matrix: Vec<Vec<SimTime>>) -> Self {
        self.propagation = Some(matrix);
        self
    }

    /// Use explicit initial balances
    pub fn balances(mut self, balances: Vec<Coins>) -> Self {
        self.balances = Some(balances);
        self
    }

    /// Use explicit speed classes
    pub fn speeds(mut self, speeds: Vec<Speed>) -> Self {
        self.speeds = Some(speeds);
        self
    }

    /// Whether to queue the initial generate events (default true)
    pub fn seed_events(mut self, seed_events: bool) -> Self {
        self.seed_events = seed_events;
        self
    }

    /// Build the simulator
    pub fn build(self) -> Result<Simulator> {
        let config = self.config;
        config.validate()?;
        let n = config.node_count;

        let mut rng = match self.seed.or(config.seed) {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::from_entropy(),
        };

        let speeds = match self.speeds {
            Some(speeds) => speeds,
            None => {
                let slow = config.slow_node_count();
                (0..n)
                    .map(|i| if i < slow { Speed::Slow } else { Speed::Fast })
                    .collect()
            },
        };
        let (low, high) = config.initial_balance;
        let balances = match self.balances {
            Some(balances) => balances,
            None => (0..n).map(|_| rng.gen_range(low..=high)).collect(),
        };
        if speeds.len() != n || balances.len() != n {
            return Err(SimulatorError::config(format!(
                "expected speeds and balances for {} nodes",
                n
            )));
        }

        let graph = match self.topology {
            Some(graph) => graph,
            None => PeerGraph::random(n, config.peer_degree(), &mut rng),
        };
        if graph.node_count() != n {
            return Err(SimulatorError::config(format!(
                "topology has {} nodes, expected {}",
                graph.node_count(),
                n
            )));
        }
        if !graph.is_connected() {
            return Err(SimulatorError::config("peer graph is not connected"));
        }

        let latency = match self.propagation {
            Some(matrix) => LatencyModel::with_propagation(speeds.clone(), matrix)?,
            None => LatencyModel::random(speeds.clone(), &mut rng)?,
        };

        let mut nodes = Vec::with_capacity(n);
        for (i, (speed, balance)) in speeds.into_iter().zip(balances).enumerate() {
            let id = NodeId(i);
            let mut node = Node::new(id, balance, speed);
            node.set_peers(graph.peers(id).cloned().unwrap_or_default());
            nodes.push(node);
        }

        let transaction_interarrival = Exp::new(1.0 / config.mean_transaction_interarrival)
            .map_err(|e| SimulatorError::config(format!("transaction interarrival: {}", e)))?;
        let block_interarrival = Exp::new(1.0 / config.mean_block_interarrival)
            .map_err(|e| SimulatorError::config(format!("block interarrival: {}", e)))?;

        info!(
            nodes = n,
            slow = config.slow_node_count(),
            links = graph.edge_count(),
            "built simulated network"
        );

        let mut sim = Simulator {
            config,
            nodes,
            graph,
            latency,
            scheduler: Scheduler::new(),
            rng,
            now: 0.0,
            next_block_id: BlockId::GENESIS.0 + 1,
            next_txn_id: 1,
            counts: EventCounts::default(),
            transaction_interarrival,
            block_interarrival,
        };

        if self.seed_events {
            sim.seed_events();
        }

        Ok(sim)
    }
}

impl Default for SimulatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
