//! Hashbeat Node
//!
//! The sending side of hash-chain heartbeats. A node generates a chain,
//! registers its public key with an access point over TCP, then reveals one
//! chain value per UDP heartbeat, newest first.
//!
//! ## Usage
//!
//! ```ignore
//! use hashbeat_core::{HashAlgorithm, HashChain, RegistrationRequest};
//! use hashbeat_node::{register, HeartbeatEmitter};
//!
//! let chain = HashChain::random(100, HashAlgorithm::Sha256)?;
//! let request = RegistrationRequest::new("node-1", *chain.public_key());
//! register(registration_addr, &request, Duration::from_secs(5)).await?;
//!
//! let mut emitter = HeartbeatEmitter::bind("node-1", chain, heartbeat_addr).await?;
//! emitter.run(Duration::from_secs(1), shutdown).await?;
//! ```

pub mod chain_store;
pub mod config;
pub mod emitter;
pub mod error;
pub mod registration;

pub use chain_store::{load_chain, load_public_key, save_chain, save_public_key};
pub use config::NodeConfig;
pub use emitter::HeartbeatEmitter;
pub use error::{NodeError, Result};
pub use registration::register;
