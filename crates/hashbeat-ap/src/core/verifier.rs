//! Heartbeat verification
//!
//! This module contains the security-critical check that a revealed chain
//! value continues the chain recorded for its client. State only advances when
//! both the chain point and the authenticator are valid.

use hashbeat_core::{decode_heartbeat, ChainValue, HashAlgorithm, HashbeatError, HeartbeatMessage};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::registry::{ChainState, ClientRecord, ClientRegistry};
use crate::storage::KeyStore;

/// How a revealed value relates to the recorded chain state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainCheck {
    /// H(w_i) == current
    Direct,
    /// H(H(w_i)) == current: exactly one heartbeat was lost
    OneSkip,
    /// Neither; replay, forgery or two or more lost heartbeats
    Invalid,
}

/// Classify `w_i` against `state`
///
/// Only a single gap is tolerated. The one-skip path is unavailable until the
/// first heartbeat has been accepted (`previous` is set); a node that loses its
/// very first heartbeat must re-register.
pub fn check_chain_point(state: &ChainState, w_i: &ChainValue, algorithm: HashAlgorithm) -> ChainCheck {
    if algorithm.hash(w_i.as_bytes()) == state.current {
        return ChainCheck::Direct;
    }

    if state.previous.is_some() && algorithm.double_hash(w_i.as_bytes()) == state.current {
        ChainCheck::OneSkip
    } else {
        ChainCheck::Invalid
    }
}

/// Result of an accepted heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// Normal single-step advance
    Advanced,
    /// Accepted after exactly one lost heartbeat
    Resynchronized,
}

/// An accepted heartbeat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub client_id: String,
    pub counter: u64,
    pub outcome: HeartbeatOutcome,
}

/// Validates heartbeats against the registry and advances accepted clients
#[derive(Debug)]
pub struct HeartbeatVerifier {
    registry: Arc<ClientRegistry>,
    store: Arc<dyn KeyStore>,
    algorithm: HashAlgorithm,
    restore_from_store: bool,
}

impl HeartbeatVerifier {
    pub fn new(registry: Arc<ClientRegistry>, store: Arc<dyn KeyStore>, algorithm: HashAlgorithm) -> Self {
        Self {
            registry,
            store,
            algorithm,
            restore_from_store: true,
        }
    }

    /// Whether unknown ids are looked up in the key store before rejecting
    pub fn with_restore(mut self, enabled: bool) -> Self {
        self.restore_from_store = enabled;
        self
    }

    /// Hash algorithm in use
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Decode and verify one datagram, logging any rejection
    pub async fn process_datagram(&self, bytes: &[u8]) -> Result<Accepted, HashbeatError> {
        let message = decode_heartbeat(bytes).map_err(|e| {
            warn!(len = bytes.len(), error = %e, "Dropping malformed heartbeat");
            e
        })?;
        self.verify(&message).await
    }

    /// Verify a decoded heartbeat and, on success, advance the client's chain
    ///
    /// A rejected heartbeat leaves the registry untouched, including for ids
    /// that would otherwise be restored from the key store.
    pub async fn verify(&self, message: &HeartbeatMessage) -> Result<Accepted, HashbeatError> {
        let client_id = message.client_id();
        let authenticator_valid = message.authenticator_valid(self.algorithm);

        let algorithm = self.algorithm;
        let w_i = message.w_i;
        let apply = |record: &mut ClientRecord| {
            let check = check_chain_point(&record.chain_state, &w_i, algorithm);
            if !authenticator_valid {
                return (check, false);
            }
            match check {
                ChainCheck::Direct => {
                    record.chain_state.previous = Some(record.chain_state.current);
                    record.chain_state.current = w_i;
                }
                ChainCheck::OneSkip => {
                    record.chain_state.current = w_i;
                    record.resynchronizations += 1;
                }
                ChainCheck::Invalid => return (check, false),
            }
            record.last_seen = Instant::now();
            record.heartbeats_accepted += 1;
            (check, true)
        };

        let mut check = self.registry.update(client_id, |record| apply(record).0);
        if check.is_none() && self.restore_from_store {
            if let Some(public_key) = self.stored_key(client_id).await {
                check = self.registry.restore_if(client_id, public_key, apply);
                if check.is_none() {
                    debug!(client_id = %client_id, "Not restoring client pending eviction");
                }
            }
        }

        let Some(check) = check else {
            warn!(client_id = %client_id, "SECURITY: Heartbeat from unknown client");
            return Err(HashbeatError::UnknownClient(client_id.to_string()));
        };

        let payload = &message.payload;
        if !authenticator_valid {
            warn!(
                client_id = %client_id,
                counter = payload.counter,
                chain_check = ?check,
                "SECURITY: Invalid authenticator"
            );
            return Err(HashbeatError::InvalidAuthenticator(client_id.to_string()));
        }

        let outcome = match check {
            ChainCheck::Direct => {
                info!(
                    client_id = %client_id,
                    timestamp = %payload.timestamp,
                    counter = payload.counter,
                    "Valid heartbeat"
                );
                HeartbeatOutcome::Advanced
            }
            ChainCheck::OneSkip => {
                warn!(
                    client_id = %client_id,
                    timestamp = %payload.timestamp,
                    counter = payload.counter,
                    "Missed a heartbeat, resynchronized on double hash"
                );
                HeartbeatOutcome::Resynchronized
            }
            ChainCheck::Invalid => {
                warn!(
                    client_id = %client_id,
                    counter = payload.counter,
                    w_i = %w_i,
                    "SECURITY: Invalid chain point"
                );
                return Err(HashbeatError::InvalidChainPoint(client_id.to_string()));
            }
        };

        Ok(Accepted {
            client_id: client_id.to_string(),
            counter: payload.counter,
            outcome,
        })
    }

    async fn stored_key(&self, client_id: &str) -> Option<ChainValue> {
        match self.store.get(client_id).await {
            Ok(key) => key,
            Err(e) => {
                warn!(client_id = %client_id, error = %e, "Key store lookup failed");
                None
            }
        }
    }
}
