//! Simulation configuration

use crate::error::{Result, SimulatorError};
use crate::types::{Coins, SimTime};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Inclusive range of peers each node samples when the topology is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDegree {
    pub min: usize,
    pub max: usize,
}

impl PeerDegree {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    /// Degree range used when none is configured: `[1 + n/2, n - 1]`
    pub fn for_node_count(node_count: usize) -> Self {
        let max = node_count.saturating_sub(1);
        Self {
            min: (1 + node_count / 2).min(max),
            max,
        }
    }
}

/// What a BlockGenerate event does when the node's chain moved after it was scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleMiningPolicy {
    /// Skip the attempt if any block was accepted after the event was created
    #[default]
    AbandonIfSuperseded,
    /// Always mine, regardless of blocks accepted in the meantime
    Never,
}

/// Simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of nodes in the network
    pub node_count: usize,

    /// Fraction of nodes on slow links, in `[0, 1]`
    pub slow_fraction: f64,

    /// Mean time between transactions generated by one node (seconds)
    pub mean_transaction_interarrival: SimTime,

    /// Mean time between blocks mined by one node (seconds)
    pub mean_block_interarrival: SimTime,

    /// Peer count range sampled per node; defaults to `[1 + n/2, n - 1]`
    pub peer_degree: Option<PeerDegree>,

    /// Inclusive range of initial node balances
    pub initial_balance: (Coins, Coins),

    /// Coins credited to a node for each block it mines
    pub mining_reward: Coins,

    /// Whether a node may mine a block with no unconfirmed transactions
    pub allow_empty_blocks: bool,

    /// Guard applied to superseded mining attempts
    pub stale_mining: StaleMiningPolicy,

    /// Seed for the simulation RNG; entropy when unset
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            node_count: 10,
            slow_fraction: 0.3,
            mean_transaction_interarrival: 0.1,
            mean_block_interarrival: 1.0,
            peer_degree: None,
            initial_balance: (11, 30),
            mining_reward: crate::MINING_REWARD,
            allow_empty_blocks: true,
            stale_mining: StaleMiningPolicy::default(),
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Load a configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Effective peer degree range
    pub fn peer_degree(&self) -> PeerDegree {
        self.peer_degree
            .unwrap_or_else(|| PeerDegree::for_node_count(self.node_count))
    }

    /// Number of slow nodes; node ids below this value are slow
    pub fn slow_node_count(&self) -> usize {
        (self.node_count as f64 * self.slow_fraction).floor() as usize
    }

    /// Check the configuration before any node is built
    pub fn validate(&self) -> Result<()> {
        if self.node_count < 2 {
            return Err(SimulatorError::config(format!(
                "node_count must be at least 2, got {}",
                self.node_count
            )));
        }

        if !(0.0..=1.0).contains(&self.slow_fraction) {
            return Err(SimulatorError::config(format!(
                "slow_fraction must be within [0, 1], got {}",
                self.slow_fraction
            )));
        }

        for (name, mean) in [
            ("mean_transaction_interarrival", self.mean_transaction_interarrival),
            ("mean_block_interarrival", self.mean_block_interarrival),
        ] {
            if !(mean.is_finite() && mean > 0.0) {
                return Err(SimulatorError::config(format!(
                    "{} must be positive, got {}",
                    name, mean
                )));
            }
        }

        let degree = self.peer_degree();
        if degree.min == 0 || degree.min > degree.max || degree.max > self.node_count - 1 {
            return Err(SimulatorError::config(format!(
                "peer degree range [{}, {}] is incompatible with {} nodes",
                degree.min, degree.max, self.node_count
            )));
        }

        let (low, high) = self.initial_balance;
        if low > high {
            return Err(SimulatorError::config(format!(
                "initial balance range [{}, {}] is empty",
                low, high
            )));
        }

        Ok(())
    }
}
