//! Access point service
//!
//! Owns the shared registry and runs the registration listener, heartbeat
//! listener, liveness monitor and optional status API until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api::{create_router, StatusState};
use crate::config::{AccessPointConfig, ConfigError};
use crate::core::{HeartbeatVerifier, LivenessMonitor};
use crate::listeners::{serve_heartbeats, serve_registrations, Registrar};
use crate::notify::DeadNodeSink;
use crate::registry::ClientRegistry;
use crate::storage::{KeyStore, StorageError};

/// Startup and runtime failures of the service
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind {what} listener on {addr}: {source}")]
    Bind {
        what: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A bound access point, ready to run
#[derive(Debug)]
pub struct AccessPointService {
    config: AccessPointConfig,
    registry: Arc<ClientRegistry>,
    store: Arc<dyn KeyStore>,
    sink: Arc<dyn DeadNodeSink>,
    registration: TcpListener,
    heartbeat: UdpSocket,
    status: Option<TcpListener>,
}

impl AccessPointService {
    /// Bind every listener named by `config`
    ///
    /// Fails without starting anything if any address is unavailable.
    pub async fn bind(
        config: AccessPointConfig,
        store: Arc<dyn KeyStore>,
        sink: Arc<dyn DeadNodeSink>,
    ) -> Result<Self, ServiceError> {
        let addr = config.registration_addr();
        let registration = TcpListener::bind(addr).await.map_err(|source| ServiceError::Bind {
            what: "registration",
            addr,
            source,
        })?;

        let addr = config.heartbeat_addr();
        let heartbeat = UdpSocket::bind(addr).await.map_err(|source| ServiceError::Bind {
            what: "heartbeat",
            addr,
            source,
        })?;

        let status = match config.status_addr() {
            Some(addr) => Some(TcpListener::bind(addr).await.map_err(|source| ServiceError::Bind {
                what: "status",
                addr,
                source,
            })?),
            None => None,
        };

        Ok(Self {
            config,
            registry: Arc::new(ClientRegistry::new()),
            store,
            sink,
            registration,
            heartbeat,
            status,
        })
    }

    /// Shared client registry
    pub fn registry(&self) -> Arc<ClientRegistry> {
        self.registry.clone()
    }

    /// Bound registration address
    pub fn registration_addr(&self) -> Result<SocketAddr, ServiceError> {
        Ok(self.registration.local_addr()?)
    }

    /// Bound heartbeat address
    pub fn heartbeat_addr(&self) -> Result<SocketAddr, ServiceError> {
        Ok(self.heartbeat.local_addr()?)
    }

    /// Bound status API address, if enabled
    pub fn status_addr(&self) -> Result<Option<SocketAddr>, ServiceError> {
        Ok(match &self.status {
            Some(listener) => Some(listener.local_addr()?),
            None => None,
        })
    }

    /// Run until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ServiceError> {
        let Self {
            config,
            registry,
            store,
            sink,
            registration,
            heartbeat,
            status,
        } = self;

        info!(
            registration = %registration.local_addr()?,
            heartbeat = %heartbeat.local_addr()?,
            hash = %config.hash_algorithm,
            timeout_ms = u64::try_from(config.liveness_timeout.as_millis()).unwrap_or(u64::MAX),
            "Access point running"
        );

        let registrar = Arc::new(Registrar::new(registry.clone(), store.clone()));
        let verifier = Arc::new(
            HeartbeatVerifier::new(registry.clone(), store.clone(), config.hash_algorithm)
                .with_restore(config.restore_from_store),
        );
        let monitor = LivenessMonitor::new(
            registry.clone(),
            store.clone(),
            sink,
            config.liveness_timeout,
            config.sweep_interval,
        );

        let status_task = async {
            let Some(listener) = status else {
                return;
            };
            let app = create_router(Arc::new(StatusState {
                registry: registry.clone(),
                store: store.clone(),
                algorithm: config.hash_algorithm,
            }));
            if let Ok(addr) = listener.local_addr() {
                info!(addr = %addr, "Status API listening");
            }
            let token = shutdown.clone();
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
            {
                error!(error = %e, "Status API failed");
            }
        };

        tokio::join!(
            serve_registrations(
                registration,
                registrar,
                config.registration_read_timeout,
                config.shutdown_grace,
                shutdown.clone(),
            ),
            serve_heartbeats(heartbeat, verifier, shutdown.clone()),
            monitor.run(shutdown.clone()),
            status_task,
        );

        info!(clients = registry.len(), "Access point stopped");
        Ok(())
    }
}
