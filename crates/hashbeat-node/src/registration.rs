//! Registration client

use hashbeat_core::{RegistrationRequest, ACK};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::error::{NodeError, Result};

/// Longest reply read from the access point
const MAX_REPLY_LEN: u64 = 64;

/// Send `request` to the access point at `addr` and wait for `ACK`
///
/// The whole exchange, connect included, is bounded by `timeout`. A closed
/// connection without `ACK` means the key was not stored and the caller
/// should retry.
pub async fn register(addr: SocketAddr, request: &RegistrationRequest, timeout: Duration) -> Result<()> {
    let exchange = async {
        let mut stream = TcpStream::connect(addr).await?;
        stream.write_all(&request.to_bytes()).await?;

        let mut reply = Vec::new();
        (&mut stream).take(MAX_REPLY_LEN).read_to_end(&mut reply).await?;
        Ok::<_, NodeError>(reply)
    };

    let reply = tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| NodeError::Timeout)??;

    if reply.trim_ascii() != ACK {
        warn!(access_point = %addr, client_id = %request.client_id, "Registration not acknowledged");
        return Err(NodeError::NotAcknowledged(addr.to_string()));
    }

    info!(access_point = %addr, client_id = %request.client_id, "Registration acknowledged");
    Ok(())
}
