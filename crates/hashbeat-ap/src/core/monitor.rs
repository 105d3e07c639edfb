//! Liveness monitor
//!
//! Periodically evicts clients that stopped sending valid heartbeats, purges
//! their persisted key and tells the coordinator.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::notify::DeadNodeSink;
use crate::registry::ClientRegistry;
use crate::storage::KeyStore;

/// Periodic dead-node sweeper
#[derive(Debug)]
pub struct LivenessMonitor {
    registry: Arc<ClientRegistry>,
    store: Arc<dyn KeyStore>,
    sink: Arc<dyn DeadNodeSink>,
    timeout: Duration,
    interval: Duration,
}

impl LivenessMonitor {
    pub fn new(
        registry: Arc<ClientRegistry>,
        store: Arc<dyn KeyStore>,
        sink: Arc<dyn DeadNodeSink>,
        timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            sink,
            timeout,
            interval,
        }
    }

    /// Liveness timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// One sweep at the current time
    pub async fn sweep(&self) -> Vec<String> {
        self.sweep_at(Instant::now()).await
    }

    /// One sweep as of `now`; returns the newly evicted ids
    ///
    /// An evicted id stays marked as purging until its key is deleted from the
    /// store. Failed deletes are retried on later sweeps; only the first
    /// eviction notifies the coordinator. Notification failures are logged and
    /// do not undo the eviction.
    pub async fn sweep_at(&self, now: Instant) -> Vec<String> {
        for client_id in self.registry.pending_purges() {
            // Re-registered since the last sweep
            if !self.registry.is_purging(&client_id) {
                continue;
            }
            self.purge_key(&client_id).await;
        }

        let evicted = self.registry.evict_if_stale(now, self.timeout);

        for client_id in &evicted {
            warn!(
                client_id = %client_id,
                timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                "Client considered DEAD"
            );

            self.purge_key(client_id).await;

            match self.sink.node_dead(client_id).await {
                Ok(()) => info!(client_id = %client_id, "Notified coordinator of dead node"),
                Err(e) => error!(client_id = %client_id, error = %e, "Failed to notify coordinator"),
            }
        }

        evicted
    }

    async fn purge_key(&self, client_id: &str) {
        match self.store.delete(client_id).await {
            Ok(deleted) => {
                debug!(client_id = %client_id, deleted, "Purged client key");
                self.registry.finish_purge(client_id);
            }
            Err(e) => error!(
                client_id = %client_id,
                error = %e,
                "Failed to delete client key, will retry"
            ),
        }
    }

    /// Sweep every interval until `shutdown` fires
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            "Liveness monitor started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }

        info!("Liveness monitor stopped");
    }
}
