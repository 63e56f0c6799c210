//! ChainSim - discrete-event simulation of a peer-to-peer cryptocurrency network
//!
//! Nodes generate and gossip transactions, mine and propagate blocks, and
//! resolve forks with a longest-chain rule, all in virtual time.

// Modules
pub mod chain;
pub mod config;
pub mod consensus;
pub mod error;
pub mod event;
pub mod latency;
pub mod network;
pub mod node;
pub mod report;
pub mod scheduler;
pub mod simulator;
pub mod types;

// Re-exports
pub use chain::{Block, BlockTree, Transaction};
pub use config::{PeerDegree, SimulationConfig, StaleMiningPolicy};
pub use error::{Result, SimulatorError};
pub use event::{Event, EventCounts, EventKind};
pub use latency::{LatencyModel, MessageKind, Speed};
pub use network::PeerGraph;
pub use node::Node;
pub use report::{NodeReport, SimulationReport};
pub use scheduler::Scheduler;
pub use simulator::{RunLimit, Simulator, SimulatorBuilder};
pub use types::{BlockId, Coins, NodeId, SimTime, TxId};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Coins credited for each mined block by default
pub const MINING_REWARD: Coins = 50;
