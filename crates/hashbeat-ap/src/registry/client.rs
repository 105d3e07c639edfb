//! Client Registry for the access point
//!
//! The single source of truth for every registered node's chain state and
//! liveness. Registration, heartbeat verification, eviction and deregistration
//! all serialize on one lock, so mutations for the same client id never
//! interleave.

use chrono::{DateTime, Utc};
use hashbeat_core::{ChainValue, HashbeatError};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Per-client position on its hash chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainState {
    /// Most recently accepted chain value (the public key right after registration)
    pub current: ChainValue,
    /// Value accepted immediately before `current`
    pub previous: Option<ChainValue>,
}

impl ChainState {
    /// State right after registration
    pub fn anchored(public_key: ChainValue) -> Self {
        Self {
            current: public_key,
            previous: None,
        }
    }
}

/// Everything the access point knows about one registered node
#[derive(Debug, Clone)]
pub struct ClientRecord {
    /// Node identity
    pub id: String,
    /// Chain position
    pub chain_state: ChainState,
    /// Last accepted heartbeat, or registration time
    pub last_seen: Instant,
    /// Wall-clock registration time
    pub registered_at: DateTime<Utc>,
    /// Heartbeats accepted since registration
    pub heartbeats_accepted: u64,
    /// Heartbeats accepted through the one-skip path
    pub resynchronizations: u64,
}

impl ClientRecord {
    fn new(id: String, public_key: ChainValue, now: Instant) -> Self {
        Self {
            id,
            chain_state: ChainState::anchored(public_key),
            last_seen: now,
            registered_at: Utc::now(),
            heartbeats_accepted: 0,
            resynchronizations: 0,
        }
    }

    /// Time since the last accepted heartbeat
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }

    /// Whether this record outlived `timeout` at `now`
    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        self.idle_for(now) > timeout
    }
}

/// Read-only view of a record for status reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientSummary {
    pub id: String,
    pub current: String,
    pub registered_at: DateTime<Utc>,
    pub idle_ms: u64,
    pub heartbeats_accepted: u64,
    pub resynchronizations: u64,
}

impl ClientSummary {
    fn from_record(record: &ClientRecord, now: Instant) -> Self {
        Self {
            id: record.id.clone(),
            current: record.chain_state.current.to_hex(),
            registered_at: record.registered_at,
            idle_ms: u64::try_from(record.idle_for(now).as_millis()).unwrap_or(u64::MAX),
            heartbeats_accepted: record.heartbeats_accepted,
            resynchronizations: record.resynchronizations,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, ClientRecord>,
    /// Evicted ids whose persisted key has not been deleted yet
    purging: HashSet<String>,
}

/// Concurrency-safe map from client id to [`ClientRecord`]
#[derive(Debug, Default)]
pub struct ClientRegistry {
    inner: RwLock<Inner>,
}

impl ClientRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Insert or replace a record anchored at `public_key`
    ///
    /// Returns `true` when an existing record was replaced.
    pub fn register(&self, id: &str, public_key: ChainValue) -> bool {
        let mut inner = self.write();
        inner.purging.remove(id);
        let replaced = inner
            .records
            .insert(id.to_string(), ClientRecord::new(id.to_string(), public_key, Instant::now()))
            .is_some();

        info!(client_id = %id, replaced, count = inner.records.len(), "Client registered");
        replaced
    }

    /// Run `f` on a record re-seeded from a persisted key, keeping it only if
    /// `f` says so
    ///
    /// `f` returns its result and whether the record should be kept. If the id
    /// is already present, `f` runs on the live record instead and nothing is
    /// re-seeded. Returns `None` while the id is mid-eviction, in which case it
    /// stays unknown.
    pub fn restore_if<T>(
        &self,
        id: &str,
        public_key: ChainValue,
        f: impl FnOnce(&mut ClientRecord) -> (T, bool),
    ) -> Option<T> {
        let mut inner = self.write();
        if inner.purging.contains(id) {
            return None;
        }
        if let Some(record) = inner.records.get_mut(id) {
            return Some(f(record).0);
        }

        let mut record = ClientRecord::new(id.to_string(), public_key, Instant::now());
        let (result, keep) = f(&mut record);
        if keep {
            inner.records.insert(id.to_string(), record);
            info!(client_id = %id, "Client restored from key store");
        }
        Some(result)
    }

    /// Remove a record explicitly; returns whether it existed
    pub fn deregister(&self, id: &str) -> bool {
        let mut inner = self.write();
        let removed = inner.records.remove(id).is_some();
        if removed {
            info!(client_id = %id, count = inner.records.len(), "Client deregistered");
        }
        removed
    }

    // =========================================================================
    // Chain state
    // =========================================================================

    /// Snapshot of a record
    pub fn get(&self, id: &str) -> Option<ClientRecord> {
        self.read().records.get(id).cloned()
    }

    /// Whether a record exists
    pub fn contains(&self, id: &str) -> bool {
        self.read().records.contains_key(id)
    }

    /// Replace a record's chain state and refresh its liveness timestamp
    ///
    /// Unconditional. Heartbeat verification checks and advances under a
    /// single lock acquisition through [`update`](ClientRegistry::update).
    pub fn advance(
        &self,
        id: &str,
        new_current: ChainValue,
        new_previous: Option<ChainValue>,
    ) -> Result<(), HashbeatError> {
        self.update(id, |record| {
            record.chain_state = ChainState {
                current: new_current,
                previous: new_previous,
            };
            record.last_seen = Instant::now();
            record.heartbeats_accepted += 1;
        })
        .ok_or_else(|| HashbeatError::UnknownClient(id.to_string()))
    }

    /// Run `f` on a record while holding the registry's write lock
    ///
    /// This is the exclusion domain for check-then-mutate sequences; `f` must
    /// not block. Returns `None` when the id is absent.
    pub fn update<T>(&self, id: &str, f: impl FnOnce(&mut ClientRecord) -> T) -> Option<T> {
        let mut inner = self.write();
        inner.records.get_mut(id).map(f)
    }

    // =========================================================================
    // Liveness
    // =========================================================================

    /// Remove every record idle for longer than `timeout` and return their ids
    ///
    /// Evicted ids are marked as purging until [`finish_purge`] is called once
    /// their key is deleted, so a late heartbeat cannot restore them from the
    /// key store in between. Only [`register`](ClientRegistry::register) or a
    /// successful purge clears the mark.
    ///
    /// [`finish_purge`]: ClientRegistry::finish_purge
    pub fn evict_if_stale(&self, now: Instant, timeout: Duration) -> Vec<String> {
        let mut inner = self.write();

        let expired: Vec<String> = inner
            .records
            .values()
            .filter(|r| r.is_stale(now, timeout))
            .map(|r| r.id.clone())
            .collect();

        for id in &expired {
            inner.records.remove(id);
            inner.purging.insert(id.clone());
        }

        if !expired.is_empty() {
            debug!(evicted = ?expired, remaining = inner.records.len(), "Evicted stale clients");
        }
        expired
    }

    /// Clear the purging mark once an evicted id's key is gone
    pub fn finish_purge(&self, id: &str) {
        self.write().purging.remove(id);
    }

    /// Evicted ids whose persisted key is still waiting to be deleted
    pub fn pending_purges(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().purging.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Whether an id was evicted and is still being purged
    pub fn is_purging(&self, id: &str) -> bool {
        self.read().purging.contains(id)
    }

    // =========================================================================
    // Aggregate views
    // =========================================================================

    /// Summaries of all records, sorted by id
    pub fn snapshot(&self) -> Vec<ClientSummary> {
        let now = Instant::now();
        let inner = self.read();
        let mut summaries: Vec<ClientSummary> = inner
            .records
            .values()
            .map(|r| ClientSummary::from_record(r, now))
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    /// Summary of one record
    pub fn summary(&self, id: &str) -> Option<ClientSummary> {
        let now = Instant::now();
        self.read()
            .records
            .get(id)
            .map(|r| ClientSummary::from_record(r, now))
    }

    /// Number of registered clients
    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    /// Whether no client is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
