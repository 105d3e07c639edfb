//! Dead-node notification sinks
//!
//! The coordinator is told about dead nodes on a best-effort basis: one
//! message per eviction, no acknowledgment, no retry.

use async_trait::async_trait;
use hashbeat_core::{encode_dead_node, HashbeatError};
use std::fmt::Debug;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::debug;

/// Error type for notification delivery
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Coordinator unreachable: {0}")]
    Unreachable(String),

    #[error("Notification channel closed")]
    ChannelClosed,
}

impl From<NotifyError> for HashbeatError {
    fn from(err: NotifyError) -> Self {
        HashbeatError::NotificationFailure(err.to_string())
    }
}

/// One-way receiver of dead-node notifications
#[async_trait]
pub trait DeadNodeSink: Send + Sync + Debug {
    /// Report that `client_id` timed out
    async fn node_dead(&self, client_id: &str) -> Result<(), NotifyError>;
}

/// Sends `NODE_DEAD|<id>` datagrams to a coordinator
#[derive(Debug, Clone)]
pub struct UdpCoordinator {
    addr: SocketAddr,
}

impl UdpCoordinator {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Coordinator address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

#[async_trait]
impl DeadNodeSink for UdpCoordinator {
    async fn node_dead(&self, client_id: &str) -> Result<(), NotifyError> {
        let local: SocketAddr = match self.addr {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| NotifyError::Unreachable(e.to_string()))?;
        socket
            .send_to(&encode_dead_node(client_id), self.addr)
            .await
            .map_err(|e| NotifyError::Unreachable(e.to_string()))?;

        debug!(client_id = %client_id, coordinator = %self.addr, "Sent dead-node notification");
        Ok(())
    }
}

/// Forwards dead client ids into an in-process channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    /// Create a sink and the receiver that observes it
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl DeadNodeSink for ChannelSink {
    async fn node_dead(&self, client_id: &str) -> Result<(), NotifyError> {
        self.tx
            .send(client_id.to_string())
            .map_err(|_| NotifyError::ChannelClosed)
    }
}

/// Discards notifications; used when no coordinator is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl DeadNodeSink for NullSink {
    async fn node_dead(&self, client_id: &str) -> Result<(), NotifyError> {
        debug!(client_id = %client_id, "No coordinator configured, dropping notification");
        Ok(())
    }
}
