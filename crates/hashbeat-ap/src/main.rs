//! Access Point Binary
//!
//! Runs the registration listener, heartbeat listener and liveness monitor.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use hashbeat_ap::{
    AccessPointConfig, AccessPointService, DeadNodeSink, KeyStore, MemoryStore, NullSink,
    ServiceError, UdpCoordinator,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let log_level = env::var("HASHBEAT_LOG_LEVEL")
        .unwrap_or_else(|_| "info".into())
        .parse()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ExitCode::FAILURE;
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Access point failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ServiceError> {
    let config = AccessPointConfig::from_env()?;
    let store = open_store(&config).await?;

    let sink: Arc<dyn DeadNodeSink> = match config.coordinator_addr {
        Some(addr) => {
            info!(coordinator = %addr, "Dead-node notifications enabled");
            Arc::new(UdpCoordinator::new(addr))
        }
        None => {
            warn!("HASHBEAT_COORDINATOR_ADDR not set, dead-node notifications are dropped");
            Arc::new(NullSink)
        }
    };

    let service = AccessPointService::bind(config, store, sink).await?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        signal.cancel();
    });

    service.run(shutdown).await
}

#[cfg(feature = "postgres")]
async fn open_store(config: &AccessPointConfig) -> Result<Arc<dyn KeyStore>, ServiceError> {
    match &config.database_url {
        Some(url) => {
            let store = hashbeat_ap::PostgresStore::new(url).await?;
            Ok(Arc::new(store))
        }
        None => {
            info!("Using in-memory key store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn open_store(config: &AccessPointConfig) -> Result<Arc<dyn KeyStore>, ServiceError> {
    if config.database_url.is_some() {
        return Err(hashbeat_ap::StorageError::Connection(
            "HASHBEAT_DATABASE_URL is set but this build lacks the postgres feature".into(),
        )
        .into());
    }
    info!("Using in-memory key store");
    Ok(Arc::new(MemoryStore::new()))
}
