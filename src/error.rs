//! Error types for the simulator

use crate::types::NodeId;
use thiserror::Error;

/// Result type alias for simulator operations
pub type Result<T> = std::result::Result<T, SimulatorError>;

/// Main error type for simulator operations
///
/// Duplicate deliveries and orphaned blocks are not errors: they are defined
/// outcomes of the receive transitions and are only counted.
#[derive(Error, Debug)]
pub enum SimulatorError {
    /// Configuration rejected before any event runs
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Latency requested for a message class the model does not know
    #[error("Invalid message kind: {0}")]
    InvalidMessageKind(String),

    /// Node id outside the simulated network
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// Generic IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SimulatorError {
    /// Create a configuration error
    pub fn config<T: Into<String>>(msg: T) -> Self {
        SimulatorError::InvalidConfiguration(msg.into())
    }

    /// Create a message kind error
    pub fn message_kind<T: Into<String>>(kind: T) -> Self {
        SimulatorError::InvalidMessageKind(kind.into())
    }
}
