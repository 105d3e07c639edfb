//! Error types for hashbeat

use thiserror::Error;

/// Result type alias using HashbeatError
pub type Result<T> = std::result::Result<T, HashbeatError>;

/// Errors that can occur while authenticating heartbeats
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashbeatError {
    /// Wire data does not parse into the expected field structure
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Heartbeat or lookup for an id with no registry entry
    #[error("Unknown client: {0}")]
    UnknownClient(String),

    /// Revealed value is neither adjacent nor one-skip adjacent to the anchor
    #[error("Invalid chain point from client '{0}'")]
    InvalidChainPoint(String),

    /// Authenticator does not equal H(payload || w_i)
    #[error("Invalid authenticator from client '{0}'")]
    InvalidAuthenticator(String),

    /// Persistent key store write or delete failed
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// Coordinator could not be reached
    #[error("Notification failure: {0}")]
    NotificationFailure(String),

    /// A chain (generated or loaded) violates the hash-link invariant
    #[error("Invalid chain: {0}")]
    InvalidChain(String),

    /// Configured hash identifier is not recognised
    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedHashAlgorithm(String),
}

impl HashbeatError {
    /// Whether this error should be surfaced to operators as a security alert
    pub fn is_security_alert(&self) -> bool {
        matches!(
            self,
            HashbeatError::UnknownClient(_)
                | HashbeatError::InvalidChainPoint(_)
                | HashbeatError::InvalidAuthenticator(_)
        )
    }
}

impl From<hex::FromHexError> for HashbeatError {
    fn from(err: hex::FromHexError) -> Self {
        HashbeatError::MalformedMessage(format!("invalid hex: {}", err))
    }
}
