//! Hashbeat Access Point
//!
//! Authenticates node heartbeats with one-time hash chain reveals and detects
//! nodes that went silent:
//! - Accepts public key registrations over TCP and persists them
//! - Verifies UDP heartbeats against each node's last accepted chain value
//! - Tolerates exactly one lost heartbeat per step
//! - Evicts idle nodes and notifies a coordinator
//!
//! ## Ports
//!
//! - `5000/tcp` - Registration: `<id>|<public_key_hex>`, answered with `ACK`
//! - `5001/udp` - Heartbeats: `<id>|<ts>|<counter>||<w_i>||<authenticator>`
//! - optional status API, see [`api`]

pub mod api;
pub mod config;
pub mod core;
pub mod listeners;
pub mod notify;
pub mod registry;
pub mod service;
pub mod storage;

pub use api::{create_router, StatusState};
pub use config::{AccessPointConfig, ConfigError};
pub use self::core::{Accepted, ChainCheck, HeartbeatOutcome, HeartbeatVerifier, LivenessMonitor};
pub use listeners::Registrar;
pub use notify::{ChannelSink, DeadNodeSink, NotifyError, NullSink, UdpCoordinator};
pub use registry::{ChainState, ClientRecord, ClientRegistry, ClientSummary};
pub use service::{AccessPointService, ServiceError};
pub use storage::{KeyStore, MemoryStore, StorageError};
#[cfg(feature = "postgres")]
pub use storage::PostgresStore;
