//! Node Binary
//!
//! Generates a hash chain, registers it with the access point and sends one
//! heartbeat per interval. A fresh chain is generated and registered each time
//! the previous one is exhausted.

use std::env;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use hashbeat_core::{HashChain, RegistrationRequest};
use hashbeat_node::{register, save_chain, save_public_key, HeartbeatEmitter, NodeConfig, NodeError};

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
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ExitCode::FAILURE;
    }

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

    match run(shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Node failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(shutdown: CancellationToken) -> Result<(), NodeError> {
    let config = NodeConfig::from_env()?;

    info!(
        client_id = %config.client_id,
        access_point = %config.access_point,
        chain_length = config.chain_length,
        hash = %config.hash_algorithm,
        "Starting node"
    );

    while !shutdown.is_cancelled() {
        let chain = HashChain::random(config.chain_length, config.hash_algorithm)?;
        if let Some(path) = &config.chain_file {
            save_chain(path, &chain).await?;
        }
        if let Some(path) = &config.public_key_file {
            save_public_key(path, chain.public_key()).await?;
        }

        let request = RegistrationRequest::new(config.client_id.as_str(), *chain.public_key());
        register_with_retry(&config, &request, &shutdown).await?;
        if shutdown.is_cancelled() {
            break;
        }

        let mut emitter = HeartbeatEmitter::bind(config.client_id.as_str(), chain, config.heartbeat_addr()).await?;
        emitter.run(config.heartbeat_interval, shutdown.clone()).await?;
    }

    info!(client_id = %config.client_id, "Node stopped");
    Ok(())
}

async fn register_with_retry(
    config: &NodeConfig,
    request: &RegistrationRequest,
    shutdown: &CancellationToken,
) -> Result<(), NodeError> {
    let mut attempt = 1;
    loop {
        match register(config.registration_addr(), request, config.registration_timeout).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < config.registration_attempts => {
                warn!(attempt, error = %e, "Registration failed, retrying");
            }
            Err(e) => return Err(e),
        }
        attempt += 1;

        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            _ = tokio::time::sleep(config.heartbeat_interval) => {}
        }
    }
}
