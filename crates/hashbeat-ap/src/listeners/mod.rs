//! Network listeners: TCP registration and UDP heartbeats

pub mod heartbeat;
pub mod registration;

pub use heartbeat::{serve_heartbeats, MAX_DATAGRAM_LEN};
pub use registration::{serve_registrations, Registrar, MAX_REQUEST_LEN};
