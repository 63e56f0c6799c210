//! Link latency model

use crate::error::{Result, SimulatorError};
use crate::types::{NodeId, SimTime};
use rand::Rng;
use rand_distr::{Distribution, Exp, Uniform};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lower bound of the per-pair propagation delay (seconds)
pub const MIN_PROPAGATION_DELAY: SimTime = 0.010;

/// Upper bound of the per-pair propagation delay (seconds)
pub const MAX_PROPAGATION_DELAY: SimTime = 0.500;

/// Link bandwidth when both endpoints are fast (bits per second)
pub const FAST_LINK_BPS: f64 = 100e6;

/// Link bandwidth when either endpoint is slow (bits per second)
pub const SLOW_LINK_BPS: f64 = 5e6;

/// Size of a block message (bits)
pub const BLOCK_MESSAGE_BITS: f64 = 8e6;

/// Queuing delay mean is this many bits over the link bandwidth
pub const QUEUING_BITS: f64 = 96e3;

/// Bandwidth class of a node, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    Fast,
    Slow,
}

impl Speed {
    pub fn is_fast(self) -> bool {
        self == Speed::Fast
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speed::Fast => write!(f, "fast"),
            Speed::Slow => write!(f, "slow"),
        }
    }
}

/// Kind of message crossing a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Transaction,
    Block,
}

impl MessageKind {
    /// Message size in bits
    pub fn size_bits(self) -> f64 {
        match self {
            MessageKind::Transaction => 0.0,
            MessageKind::Block => BLOCK_MESSAGE_BITS,
        }
    }
}

impl FromStr for MessageKind {
    type Err = SimulatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "transaction" => Ok(MessageKind::Transaction),
            "block" => Ok(MessageKind::Block),
            other => Err(SimulatorError::message_kind(other)),
        }
    }
}

/// Propagation delays plus per-call bandwidth and queuing terms
#[derive(Debug, Clone)]
pub struct LatencyModel {
    speeds: Vec<Speed>,
    propagation: Vec<Vec<SimTime>>,
    fast_queue: Exp<f64>,
    slow_queue: Exp<f64>,
}

impl LatencyModel {
    /// Draw a symmetric propagation-delay matrix uniformly from the default bounds
    pub fn random<R: Rng + ?Sized>(speeds: Vec<Speed>, rng: &mut R) -> Result<Self> {
        let n = speeds.len();
        let uniform = Uniform::new_inclusive(MIN_PROPAGATION_DELAY, MAX_PROPAGATION_DELAY);
        let mut propagation = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let delay = uniform.sample(rng);
                propagation[i][j] = delay;
                propagation[j][i] = delay;
            }
        }
        Self::with_propagation(speeds, propagation)
    }

    /// Use an explicit propagation-delay matrix
    pub fn with_propagation(speeds: Vec<Speed>, propagation: Vec<Vec<SimTime>>) -> Result<Self> {
        let n = speeds.len();
        if propagation.len() != n || propagation.iter().any(|row| row.len() != n) {
            return Err(SimulatorError::config(format!(
                "propagation matrix must be {}x{}",
                n, n
            )));
        }
        for i in 0..n {
            for j in 0..n {
                let delay = propagation[i][j];
                if !(delay.is_finite() && delay >= 0.0) || delay != propagation[j][i] {
                    return Err(SimulatorError::config(format!(
                        "propagation delay between {} and {} must be symmetric and non-negative",
                        i, j
                    )));
                }
            }
        }

        Ok(Self {
            speeds,
            propagation,
            fast_queue: queuing_distribution(FAST_LINK_BPS)?,
            slow_queue: queuing_distribution(SLOW_LINK_BPS)?,
        })
    }

    /// Same propagation delay on every link
    pub fn uniform(speeds: Vec<Speed>, delay: SimTime) -> Result<Self> {
        let n = speeds.len();
        let propagation = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 0.0 } else { delay }).collect())
            .collect();
        Self::with_propagation(speeds, propagation)
    }

    pub fn node_count(&self) -> usize {
        self.speeds.len()
    }

    pub fn speed(&self, node: NodeId) -> Result<Speed> {
        self.speeds
            .get(node.index())
            .copied()
            .ok_or(SimulatorError::UnknownNode(node))
    }

    /// Fixed propagation component between two nodes
    pub fn propagation(&self, a: NodeId, b: NodeId) -> Result<SimTime> {
        self.check(a)?;
        self.check(b)?;
        Ok(self.propagation[a.index()][b.index()])
    }

    /// Link bandwidth in bits per second; slow dominates
    pub fn bandwidth(&self, a: NodeId, b: NodeId) -> Result<f64> {
        Ok(if self.speed(a)?.is_fast() && self.speed(b)?.is_fast() {
            FAST_LINK_BPS
        } else {
            SLOW_LINK_BPS
        })
    }

    /// Delay for one message from `sender` to `receiver`
    ///
    /// The queuing term is drawn fresh on every call.
    pub fn latency<R: Rng + ?Sized>(
        &self,
        sender: NodeId,
        receiver: NodeId,
        kind: MessageKind,
        rng: &mut R,
    ) -> Result<SimTime> {
        let propagation = self.propagation(sender, receiver)?;
        let bandwidth = self.bandwidth(sender, receiver)?;
        let queue = if bandwidth == FAST_LINK_BPS {
            &self.fast_queue
        } else {
            &self.slow_queue
        };
        let queuing = queue.sample(rng);
        Ok(propagation + kind.size_bits() / bandwidth + queuing)
    }

    fn check(&self, node: NodeId) -> Result<()> {
        if node.index() < self.speeds.len() {
            Ok(())
        } else {
            Err(SimulatorError::UnknownNode(node))
        }
    }
}

fn queuing_distribution(bandwidth: f64) -> Result<Exp<f64>> {
    let mean = QUEUING_BITS / bandwidth;
    Exp::new(1.0 / mean).map_err(|e| SimulatorError::config(format!("queuing delay: {}", e)))
}
