//! Error types for the node

use hashbeat_core::HashbeatError;
use thiserror::Error;

/// Result type for node operations
pub type Result<T> = std::result::Result<T, NodeError>;

/// Errors that can occur on the node side
#[derive(Error, Debug)]
pub enum NodeError {
    /// Chain or codec error
    #[error(transparent)]
    Protocol(#[from] HashbeatError),

    /// Socket or file error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The access point closed the exchange without acknowledging
    #[error("Registration not acknowledged by {0}")]
    NotAcknowledged(String),

    /// The access point did not answer in time
    #[error("Registration timed out")]
    Timeout,

    /// Every chain value has been revealed
    #[error("Hash chain exhausted after {0} heartbeats")]
    ChainExhausted(usize),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}
