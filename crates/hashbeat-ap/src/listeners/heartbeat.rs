//! Heartbeat reception over UDP

use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::HeartbeatVerifier;

/// Receive buffer size; larger datagrams are truncated and fail to decode
pub const MAX_DATAGRAM_LEN: usize = 4096;

/// Verify every datagram arriving on `socket` until `shutdown` fires
///
/// Rejected heartbeats are dropped without a reply. The verifier logs the
/// reason for each rejection.
pub async fn serve_heartbeats(
    socket: UdpSocket,
    verifier: Arc<HeartbeatVerifier>,
    shutdown: CancellationToken,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_LEN];

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, peer)) => {
                    debug!(peer = %peer, len, "Heartbeat datagram received");
                    // Result is already logged by the verifier
                    let _ = verifier.process_datagram(&buf[..len]).await;
                }
                Err(e) => warn!(error = %e, "Failed to receive heartbeat datagram"),
            },
        }
    }

    info!("Heartbeat listener stopped");
}
