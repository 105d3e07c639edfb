//! # Hashbeat Core
//!
//! Chain arithmetic and wire codecs for hash-chain authenticated heartbeats.
//!
//! A node builds a chain `v0 = seed, v_{k+1} = H(v_k)` of `N + 1` values and
//! registers `v_N` (the public key) with an access point. Every heartbeat then
//! reveals the next value walking backwards, so the access point only has to
//! hash the revealed value once and compare it against the last accepted one.
//!
//! ## Key Concepts
//!
//! - **Chain value**: a 32-byte digest on the chain
//! - **Public key**: the chain's terminal value, disclosed once at registration
//! - **Authenticator**: `H(payload || w_i)`, binding a payload to its chain value
//! - **One-skip resynchronization**: `H(H(w_i))` matching the last accepted
//!   value means exactly one heartbeat was lost
//!
//! Nothing in this crate holds state; every function is safe to call
//! concurrently.

pub mod chain;
pub mod codec;
pub mod error;
pub mod hash;

pub use chain::HashChain;
pub use codec::{
    compute_authenticator, decode_dead_node, decode_heartbeat, encode_dead_node,
    encode_heartbeat, HeartbeatMessage, HeartbeatPayload, RegistrationRequest, ACK,
};
pub use error::{HashbeatError, Result};
pub use hash::{ChainValue, HashAlgorithm, DIGEST_LEN};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
