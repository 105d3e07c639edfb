//! Key registration over TCP
//!
//! One request per connection: `<client_id>|<public_key_hex>`. The access point
//! answers `ACK` on success and closes the connection silently on failure.

use hashbeat_core::{HashbeatError, RegistrationRequest, ACK};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::registry::ClientRegistry;
use crate::storage::KeyStore;

/// Largest registration request read from a connection
pub const MAX_REQUEST_LEN: usize = 4096;

/// Persists public keys and seeds the registry
#[derive(Debug)]
pub struct Registrar {
    registry: Arc<ClientRegistry>,
    store: Arc<dyn KeyStore>,
}

impl Registrar {
    pub fn new(registry: Arc<ClientRegistry>, store: Arc<dyn KeyStore>) -> Self {
        Self { registry, store }
    }

    /// Store the key, then seed the registry
    ///
    /// A storage failure is returned as `StorageFailure`, but the in-memory
    /// registration still happens.
    pub async fn register(&self, request: &RegistrationRequest) -> Result<(), HashbeatError> {
        let stored = self.store.put(&request.client_id, &request.public_key).await;
        self.registry.register(&request.client_id, request.public_key);

        stored.map_err(|e| {
            error!(client_id = %request.client_id, error = %e, "Failed to persist public key");
            HashbeatError::from(e)
        })
    }

    /// Run one registration exchange on `stream`
    pub async fn handle_connection<S>(
        &self,
        mut stream: S,
        peer: SocketAddr,
        read_timeout: Duration,
    ) -> Result<RegistrationRequest, HashbeatError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; MAX_REQUEST_LEN];
        let len = match tokio::time::timeout(read_timeout, stream.read(&mut buf)).await {
            Ok(Ok(0)) => {
                return Err(HashbeatError::MalformedMessage("connection closed before request".into()))
            }
            Ok(Ok(len)) => len,
            Ok(Err(e)) => return Err(HashbeatError::MalformedMessage(format!("read failed: {}", e))),
            Err(_) => return Err(HashbeatError::MalformedMessage("registration read timed out".into())),
        };

        let request = RegistrationRequest::parse(&buf[..len]).map_err(|e| {
            warn!(peer = %peer, error = %e, "Invalid registration request");
            e
        })?;

        self.register(&request).await?;

        stream
            .write_all(ACK)
            .await
            .map_err(|e| HashbeatError::MalformedMessage(format!("failed to send ACK: {}", e)))?;
        let _ = stream.shutdown().await;

        info!(client_id = %request.client_id, peer = %peer, "Public key registered");
        Ok(request)
    }
}

/// Accept registration connections until `shutdown` fires
///
/// Each connection runs in its own task. On shutdown, in-flight exchanges get
/// `grace` to finish before they are aborted.
pub async fn serve_registrations(
    listener: TcpListener,
    registrar: Arc<Registrar>,
    read_timeout: Duration,
    grace: Duration,
    shutdown: CancellationToken,
) {
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    error!(error = %e, "Registration task panicked");
                }
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "Registration connection accepted");
                    let registrar = registrar.clone();
                    tasks.spawn(async move {
                        if let Err(e) = registrar.handle_connection(stream, peer, read_timeout).await {
                            debug!(peer = %peer, error = %e, "Registration closed without ACK");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "Failed to accept registration connection"),
            },
        }
    }

    let in_flight = tasks.len();
    if in_flight > 0 {
        info!(in_flight, "Waiting for in-flight registrations");
        let drained = tokio::time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(remaining = tasks.len(), "Aborting unfinished registrations");
            tasks.shutdown().await;
        }
    }

    info!("Registration listener stopped");
}
