//! Shared client state

mod client;

pub use client::{ChainState, ClientRecord, ClientRegistry, ClientSummary};
