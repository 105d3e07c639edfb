//! Heartbeat Verification Tests
//!
//! End-to-end behaviour of the verifier against a live registry and key store,
//! including the attacks the chain construction is meant to stop.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hashbeat_ap::{
    ChannelSink, ClientRegistry, HeartbeatOutcome, HeartbeatVerifier, KeyStore, LivenessMonitor,
    MemoryStore, Registrar, StorageError,
};
use hashbeat_core::{
    encode_heartbeat, ChainValue, HashAlgorithm, HashChain, HashbeatError, HeartbeatPayload,
    RegistrationRequest,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;

const ALG: HashAlgorithm = HashAlgorithm::Sha256;

// =============================================================================
// Test Helpers
// =============================================================================

struct AccessPoint {
    registry: Arc<ClientRegistry>,
    store: Arc<MemoryStore>,
    registrar: Registrar,
    verifier: HeartbeatVerifier,
}

fn access_point() -> AccessPoint {
    let registry = Arc::new(ClientRegistry::new());
    let store = Arc::new(MemoryStore::new());
    AccessPoint {
        registrar: Registrar::new(registry.clone(), store.clone()),
        verifier: HeartbeatVerifier::new(registry.clone(), store.clone(), ALG),
        registry,
        store,
    }
}

/// Heartbeat `i` of `chain` for `client_id`
fn heartbeat(client_id: &str, chain: &HashChain, i: usize) -> Vec<u8> {
    reveal(client_id, chain.reveal(i).unwrap(), i as u64)
}

/// Correctly authenticated heartbeat revealing an arbitrary value
fn reveal(client_id: &str, w_i: &ChainValue, counter: u64) -> Vec<u8> {
    let payload = HeartbeatPayload::new(client_id, "1718000000.500000", counter);
    encode_heartbeat(ALG, &payload, w_i)
}

/// Key store whose writes and deletes can be made to fail
#[derive(Debug, Default)]
struct FailingStore {
    inner: MemoryStore,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

#[async_trait]
impl KeyStore for FailingStore {
    async fn put(&self, client_id: &str, public_key: &ChainValue) -> Result<(), StorageError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Database("disk full".into()));
        }
        self.inner.put(client_id, public_key).await
    }

    async fn get(&self, client_id: &str) -> Result<Option<ChainValue>, StorageError> {
        self.inner.get(client_id).await
    }

    async fn delete(&self, client_id: &str) -> Result<bool, StorageError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("connection reset".into()));
        }
        self.inner.delete(client_id).await
    }
}

async fn registered(ap: &AccessPoint, client_id: &str, length: usize) -> HashChain {
    let chain = HashChain::random(length, ALG).unwrap();
    ap.registrar
        .register(&RegistrationRequest::new(client_id, *chain.public_key()))
        .await
        .unwrap();
    chain
}

// =============================================================================
// Normal operation
// =============================================================================

#[tokio::test]
async fn sequential_heartbeats_accepted_in_chain_order() {
    let ap = access_point();
    let chain = registered(&ap, "node-1", 10).await;

    for i in 1..=10 {
        let accepted = ap.verifier.process_datagram(&heartbeat("node-1", &chain, i)).await.unwrap();
        assert_eq!(accepted.outcome, HeartbeatOutcome::Advanced);
        assert_eq!(accepted.counter, i as u64);

        let state = ap.registry.get("node-1").unwrap().chain_state;
        assert_eq!(&state.current, chain.reveal(i).unwrap());
    }

    assert_eq!(ap.registry.get("node-1").unwrap().heartbeats_accepted, 10);
}

#[tokio::test]
async fn one_lost_heartbeat_is_recovered() {
    let ap = access_point();
    let chain = registered(&ap, "node-1", 10).await;

    ap.verifier.process_datagram(&heartbeat("node-1", &chain, 1)).await.unwrap();
    // heartbeat 2 lost in transit
    let accepted = ap.verifier.process_datagram(&heartbeat("node-1", &chain, 3)).await.unwrap();
    assert_eq!(accepted.outcome, HeartbeatOutcome::Resynchronized);

    let record = ap.registry.get("node-1").unwrap();
    assert_eq!(&record.chain_state.current, chain.reveal(3).unwrap());
    assert_eq!(record.resynchronizations, 1);

    // back on the normal path
    let accepted = ap.verifier.process_datagram(&heartbeat("node-1", &chain, 4)).await.unwrap();
    assert_eq!(accepted.outcome, HeartbeatOutcome::Advanced);
}

#[tokio::test]
async fn two_lost_heartbeats_are_rejected() {
    let ap = access_point();
    let chain = registered(&ap, "node-1", 10).await;

    ap.verifier.process_datagram(&heartbeat("node-1", &chain, 1)).await.unwrap();
    let result = ap.verifier.process_datagram(&heartbeat("node-1", &chain, 4)).await;
    assert_eq!(result, Err(HashbeatError::InvalidChainPoint("node-1".into())));

    let state = ap.registry.get("node-1").unwrap().chain_state;
    assert_eq!(&state.current, chain.reveal(1).unwrap());
}

#[tokio::test]
async fn losing_the_first_heartbeat_requires_reregistration() {
    let ap = access_point();
    let chain = registered(&ap, "node-1", 10).await;

    let result = ap.verifier.process_datagram(&heartbeat("node-1", &chain, 2)).await;
    assert_eq!(result, Err(HashbeatError::InvalidChainPoint("node-1".into())));
}

// =============================================================================
// ATTACK: Replay
// =============================================================================

/// An eavesdropper resends a captured heartbeat verbatim. The revealed value is
/// already the current anchor, so H(w_i) cannot match.
#[tokio::test]
async fn attack_replay_rejected() {
    let ap = access_point();
    let chain = registered(&ap, "node-1", 10).await;

    let captured = heartbeat("node-1", &chain, 1);
    ap.verifier.process_datagram(&captured).await.unwrap();

    let result = ap.verifier.process_datagram(&captured).await;
    assert_eq!(result, Err(HashbeatError::InvalidChainPoint("node-1".into())));
    assert!(result.unwrap_err().is_security_alert());
}

/// An older heartbeat replayed after the chain moved on is equally useless.
#[tokio::test]
async fn attack_stale_replay_rejected() {
    let ap = access_point();
    let chain = registered(&ap, "node-1", 10).await;

    let first = heartbeat("node-1", &chain, 1);
    ap.verifier.process_datagram(&first).await.unwrap();
    ap.verifier.process_datagram(&heartbeat("node-1", &chain, 2)).await.unwrap();

    let result = ap.verifier.process_datagram(&first).await;
    assert_eq!(result, Err(HashbeatError::InvalidChainPoint("node-1".into())));
}

// =============================================================================
// ATTACK: Forgery
// =============================================================================

/// A value from some other chain, properly authenticated, is not on the
/// registered chain.
#[tokio::test]
async fn attack_foreign_chain_value_rejected() {
    let ap = access_point();
    registered(&ap, "node-1", 10).await;
    let other = HashChain::random(10, ALG).unwrap();

    let result = ap.verifier.process_datagram(&heartbeat("node-1", &other, 1)).await;
    assert_eq!(result, Err(HashbeatError::InvalidChainPoint("node-1".into())));
}

/// Using one node's chain under another node's id fails against the victim's
/// registered key.
#[tokio::test]
async fn attack_identity_swap_rejected() {
    let ap = access_point();
    let alice = registered(&ap, "alice", 10).await;
    registered(&ap, "mallory", 10).await;

    let result = ap.verifier.process_datagram(&heartbeat("mallory", &alice, 1)).await;
    assert_eq!(result, Err(HashbeatError::InvalidChainPoint("mallory".into())));
}

// =============================================================================
// ATTACK: Tampering
// =============================================================================

/// Flip every byte of the payload in turn; none may verify.
#[tokio::test]
async fn attack_payload_tampering_rejected() {
    let ap = access_point();
    let chain = registered(&ap, "node-1", 10).await;
    let genuine = heartbeat("node-1", &chain, 1);
    let payload_len = genuine.len() - 68;

    for idx in 0..payload_len {
        let mut forged = genuine.clone();
        // stay inside ASCII digits and letters so the payload still parses
        forged[idx] = match forged[idx] {
            b'|' | b'.' => continue,
            b'9' => b'8',
            b @ b'0'..=b'8' => b + 1,
            b => b ^ 0x20,
        };

        match ap.verifier.process_datagram(&forged).await {
            Err(HashbeatError::InvalidAuthenticator(_)) | Err(HashbeatError::UnknownClient(_)) => {}
            other => panic!("tampered byte {} produced {:?}", idx, other),
        }
    }

    let state = ap.registry.get("node-1").unwrap().chain_state;
    assert_eq!(&state.current, chain.public_key());
}

/// Swapping in a different chain value breaks the authenticator even when the
/// new value would pass the chain check.
#[tokio::test]
async fn attack_chain_value_tampering_rejected() {
    let ap = access_point();
    let chain = registered(&ap, "node-1", 10).await;

    // authenticated for w_1 but carrying a corrupted w_1
    let mut forged = heartbeat("node-1", &chain, 1);
    let w_start = forged.len() - 66;
    forged[w_start] ^= 0x01;

    let result = ap.verifier.process_datagram(&forged).await;
    assert_eq!(result, Err(HashbeatError::InvalidAuthenticator("node-1".into())));
}

/// A correct chain value with a bad authenticator must not advance state, so
/// the genuine heartbeat still verifies afterwards.
#[tokio::test]
async fn attack_authenticator_forgery_does_not_advance_state() {
    let ap = access_point();
    let chain = registered(&ap, "node-1", 10).await;

    let genuine = heartbeat("node-1", &chain, 1);
    let mut forged = genuine.clone();
    let last = forged.len() - 1;
    forged[last] ^= 0xff;

    let result = ap.verifier.process_datagram(&forged).await;
    assert_eq!(result, Err(HashbeatError::InvalidAuthenticator("node-1".into())));
    assert_eq!(&ap.registry.get("node-1").unwrap().chain_state.current, chain.public_key());

    ap.verifier.process_datagram(&genuine).await.unwrap();
}

// =============================================================================
// Unknown clients
// =============================================================================

#[tokio::test]
async fn unknown_client_rejected_without_side_effects() {
    let ap = access_point();
    let chain = HashChain::random(5, ALG).unwrap();

    let result = ap.verifier.process_datagram(&heartbeat("ghost", &chain, 1)).await;
    assert_eq!(result, Err(HashbeatError::UnknownClient("ghost".into())));
    assert!(ap.registry.is_empty());
}

#[tokio::test]
async fn malformed_datagrams_rejected() {
    let ap = access_point();
    registered(&ap, "node-1", 5).await;

    let junk_inputs: [&[u8]; 4] = [b"", b"node-1", b"node-1|1|1||x||y", &[0xff; 200]];
    for junk in junk_inputs {
        let result = ap.verifier.process_datagram(junk).await;
        assert!(matches!(result, Err(HashbeatError::MalformedMessage(_))), "{:?}", junk);
    }
}

// =============================================================================
// Restore from the key store
// =============================================================================

#[tokio::test]
async fn client_restored_from_key_store() {
    let ap = access_point();
    let chain = HashChain::random(5, ALG).unwrap();
    // persisted by an earlier process; memory is empty
    ap.store.put("node-1", chain.public_key()).await.unwrap();

    let accepted = ap.verifier.process_datagram(&heartbeat("node-1", &chain, 1)).await.unwrap();
    assert_eq!(accepted.outcome, HeartbeatOutcome::Advanced);
    assert!(ap.registry.contains("node-1"));
}

#[tokio::test]
async fn restore_disabled_keeps_client_unknown() {
    let registry = Arc::new(ClientRegistry::new());
    let store = Arc::new(MemoryStore::new());
    let verifier = HeartbeatVerifier::new(registry.clone(), store.clone(), ALG).with_restore(false);

    let chain = HashChain::random(5, ALG).unwrap();
    store.put("node-1", chain.public_key()).await.unwrap();

    let result = verifier.process_datagram(&heartbeat("node-1", &chain, 1)).await;
    assert_eq!(result, Err(HashbeatError::UnknownClient("node-1".into())));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn rejected_heartbeat_does_not_restore_client() {
    let ap = access_point();
    let chain = HashChain::random(5, ALG).unwrap();
    ap.store.put("node-1", chain.public_key()).await.unwrap();

    let forged = ChainValue::new([0xee; 32]);
    let result = ap.verifier.process_datagram(&reveal("node-1", &forged, 1)).await;
    assert_eq!(result, Err(HashbeatError::InvalidChainPoint("node-1".into())));
    assert!(!ap.registry.contains("node-1"));

    let mut datagram = heartbeat("node-1", &chain, 1);
    let last = datagram.len() - 1;
    datagram[last] ^= 0x01;
    let result = ap.verifier.process_datagram(&datagram).await;
    assert_eq!(result, Err(HashbeatError::InvalidAuthenticator("node-1".into())));
    assert!(!ap.registry.contains("node-1"));

    // The genuine heartbeat still restores the client afterwards
    let accepted = ap.verifier.process_datagram(&heartbeat("node-1", &chain, 1)).await.unwrap();
    assert_eq!(accepted.outcome, HeartbeatOutcome::Advanced);
    assert_eq!(ap.registry.get("node-1").unwrap().heartbeats_accepted, 1);
}

// =============================================================================
// Liveness
// =============================================================================

#[tokio::test]
async fn evicted_client_is_unknown_until_reregistered() {
    let ap = access_point();
    let chain = registered(&ap, "node-1", 10).await;
    ap.verifier.process_datagram(&heartbeat("node-1", &chain, 1)).await.unwrap();

    let (sink, mut dead) = ChannelSink::new();
    let monitor = LivenessMonitor::new(
        ap.registry.clone(),
        ap.store.clone(),
        Arc::new(sink),
        Duration::from_secs(7),
        Duration::from_secs(1),
    );

    let evicted = monitor.sweep_at(Instant::now() + Duration::from_secs(8)).await;
    assert_eq!(evicted, vec!["node-1".to_string()]);
    assert_eq!(dead.recv().await.as_deref(), Some("node-1"));
    assert!(dead.try_recv().is_err());
    assert!(ap.store.is_empty());

    let result = ap.verifier.process_datagram(&heartbeat("node-1", &chain, 2)).await;
    assert_eq!(result, Err(HashbeatError::UnknownClient("node-1".into())));

    let fresh = registered(&ap, "node-1", 10).await;
    ap.verifier.process_datagram(&heartbeat("node-1", &fresh, 1)).await.unwrap();
}

// =============================================================================
// Key store failures
// =============================================================================

#[tokio::test]
async fn registration_survives_store_failure_without_ack() {
    let registry = Arc::new(ClientRegistry::new());
    let store = Arc::new(FailingStore::default());
    store.fail_puts.store(true, Ordering::SeqCst);
    let registrar = Registrar::new(registry.clone(), store.clone());
    let verifier = HeartbeatVerifier::new(registry.clone(), store.clone(), ALG);

    let chain = HashChain::random(5, ALG).unwrap();
    let (mut client, server) = tokio::io::duplex(8192);
    client
        .write_all(&RegistrationRequest::new("node-1", *chain.public_key()).to_bytes())
        .await
        .unwrap();

    let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
    let result = registrar.handle_connection(server, peer, Duration::from_secs(1)).await;
    assert!(matches!(result, Err(HashbeatError::StorageFailure(_))));

    let mut reply = Vec::new();
    client.read_to_end(&mut reply).await.unwrap();
    assert!(reply.is_empty());

    // Seeded in memory even though nothing was persisted
    assert!(registry.contains("node-1"));
    assert_eq!(store.get("node-1").await.unwrap(), None);
    let accepted = verifier.process_datagram(&heartbeat("node-1", &chain, 1)).await.unwrap();
    assert_eq!(accepted.outcome, HeartbeatOutcome::Advanced);
}

#[tokio::test]
async fn eviction_stands_when_key_delete_fails() {
    let registry = Arc::new(ClientRegistry::new());
    let store = Arc::new(FailingStore::default());
    let registrar = Registrar::new(registry.clone(), store.clone());
    let verifier = HeartbeatVerifier::new(registry.clone(), store.clone(), ALG);

    let chain = HashChain::random(10, ALG).unwrap();
    registrar
        .register(&RegistrationRequest::new("node-1", *chain.public_key()))
        .await
        .unwrap();
    verifier.process_datagram(&heartbeat("node-1", &chain, 1)).await.unwrap();

    let (sink, mut dead) = ChannelSink::new();
    let monitor = LivenessMonitor::new(
        registry.clone(),
        store.clone(),
        Arc::new(sink),
        Duration::from_secs(7),
        Duration::from_secs(1),
    );

    store.fail_deletes.store(true, Ordering::SeqCst);
    let evicted = monitor.sweep_at(Instant::now() + Duration::from_secs(8)).await;
    assert_eq!(evicted, vec!["node-1".to_string()]);
    assert_eq!(dead.recv().await.as_deref(), Some("node-1"));
    assert!(store.get("node-1").await.unwrap().is_some());

    // The surviving key must not bring the node back
    let result = verifier.process_datagram(&heartbeat("node-1", &chain, 2)).await;
    assert_eq!(result, Err(HashbeatError::UnknownClient("node-1".into())));
    assert!(!registry.contains("node-1"));

    assert!(monitor
        .sweep_at(Instant::now() + Duration::from_secs(16))
        .await
        .is_empty());
    assert!(registry.is_purging("node-1"));

    store.fail_deletes.store(false, Ordering::SeqCst);
    monitor.sweep_at(Instant::now() + Duration::from_secs(24)).await;
    assert!(!registry.is_purging("node-1"));
    assert_eq!(store.get("node-1").await.unwrap(), None);

    let result = verifier.process_datagram(&heartbeat("node-1", &chain, 2)).await;
    assert_eq!(result, Err(HashbeatError::UnknownClient("node-1".into())));
    assert!(dead.try_recv().is_err());
}

// =============================================================================
// Fixed chain: zero seed, length 3
// =============================================================================

#[tokio::test]
async fn zero_seed_chain_scenario() {
    let ap = access_point();
    let chain = HashChain::generate(ChainValue::new([0u8; 32]), 3, ALG).unwrap();
    let v = |k: usize| *chain.value(k).unwrap();

    assert_eq!(v(1), ALG.hash(&[0u8; 32]));
    assert_eq!(v(3), ALG.hash(v(2).as_bytes()));

    ap.registrar
        .register(&RegistrationRequest::new("node-0", v(3)))
        .await
        .unwrap();

    // v2 links to the registered v3
    let accepted = ap.verifier.process_datagram(&reveal("node-0", &v(2), 1)).await.unwrap();
    assert_eq!(accepted.outcome, HeartbeatOutcome::Advanced);

    // replaying v2
    let result = ap.verifier.process_datagram(&reveal("node-0", &v(2), 1)).await;
    assert_eq!(result, Err(HashbeatError::InvalidChainPoint("node-0".into())));

    // the seed is two links below v2: one lost heartbeat, recovered
    let accepted = ap.verifier.process_datagram(&reveal("node-0", &v(0), 3)).await.unwrap();
    assert_eq!(accepted.outcome, HeartbeatOutcome::Resynchronized);

    // nothing lies below the seed; v1 now hashes forward, never back
    let result = ap.verifier.process_datagram(&reveal("node-0", &v(1), 2)).await;
    assert_eq!(result, Err(HashbeatError::InvalidChainPoint("node-0".into())));
}

#[tokio::test]
async fn zero_seed_chain_rejects_seed_before_first_acceptance() {
    let ap = access_point();
    let chain = HashChain::generate(ChainValue::new([0u8; 32]), 3, ALG).unwrap();
    ap.registrar
        .register(&RegistrationRequest::new("node-0", *chain.public_key()))
        .await
        .unwrap();

    let result = ap.verifier.process_datagram(&reveal("node-0", chain.seed(), 3)).await;
    assert_eq!(result, Err(HashbeatError::InvalidChainPoint("node-0".into())));
}

// =============================================================================
// Concurrency
// =============================================================================

/// The same heartbeat delivered twice at once is accepted exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_accepted_once() {
    let ap = access_point();
    let chain = registered(&ap, "node-1", 10).await;
    let verifier = Arc::new(ap.verifier);
    let datagram = heartbeat("node-1", &chain, 1);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let verifier = verifier.clone();
        let datagram = datagram.clone();
        handles.push(tokio::spawn(async move { verifier.process_datagram(&datagram).await }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(ap.registry.get("node-1").unwrap().heartbeats_accepted, 1);
}
