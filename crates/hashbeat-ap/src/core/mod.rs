//! Core logic for the access point

mod monitor;
mod verifier;

pub use monitor::LivenessMonitor;
pub use verifier::{check_chain_point, Accepted, ChainCheck, HeartbeatOutcome, HeartbeatVerifier};
