//! Property-Based Tests for hash-chain invariants
//!
//! 1. LINKAGE: every adjacent pair satisfies H(v_{k}) == v_{k+1}
//! 2. TERMINAL: the public key is N applications of H to the seed
//! 3. BINDING: the authenticator detects any single-byte change
//!
//! Uses proptest for property-based testing with arbitrary inputs.

use hashbeat_core::{
    decode_heartbeat, encode_heartbeat, ChainValue, HashAlgorithm, HashChain, HeartbeatPayload,
};
use proptest::prelude::*;

fn algorithm() -> impl Strategy<Value = HashAlgorithm> {
    prop_oneof![Just(HashAlgorithm::Sha256), Just(HashAlgorithm::Blake2b256)]
}

proptest! {
    /// The terminal value equals N applications of the hash to the seed
    #[test]
    fn prop_public_key_is_n_fold_hash(
        seed in any::<[u8; 32]>(),
        length in 1usize..64,
        alg in algorithm(),
    ) {
        let chain = HashChain::generate(ChainValue::new(seed), length, alg).unwrap();

        let mut expected = ChainValue::new(seed);
        for _ in 0..length {
            expected = alg.hash(expected.as_bytes());
        }

        prop_assert_eq!(chain.public_key(), &expected);
        prop_assert_eq!(chain.length(), length);
    }

    /// Every adjacent pair is a single hash link
    #[test]
    fn prop_adjacent_values_link(
        seed in any::<[u8; 32]>(),
        length in 1usize..64,
        alg in algorithm(),
    ) {
        let chain = HashChain::generate(ChainValue::new(seed), length, alg).unwrap();

        for pair in chain.values().windows(2) {
            prop_assert!(pair[0].links_to(&pair[1], alg));
            prop_assert_eq!(alg.hash(pair[0].as_bytes()), pair[1]);
        }
    }

    /// Each revealed value hashes to the previously revealed one
    #[test]
    fn prop_reveals_verify_backwards(
        seed in any::<[u8; 32]>(),
        length in 1usize..32,
    ) {
        let alg = HashAlgorithm::Sha256;
        let chain = HashChain::generate(ChainValue::new(seed), length, alg).unwrap();

        let mut anchor = *chain.public_key();
        for i in 1..=length {
            let revealed = *chain.reveal(i).unwrap();
            prop_assert!(revealed.links_to(&anchor, alg));
            anchor = revealed;
        }
        prop_assert_eq!(&anchor, chain.seed());
    }

    /// Flipping any byte of payload or w_i invalidates the authenticator
    #[test]
    fn prop_authenticator_binds_payload_and_value(
        client in "[a-z0-9-]{1,24}",
        counter in any::<u64>(),
        w in any::<[u8; 32]>(),
        flip_seed in any::<usize>(),
    ) {
        let alg = HashAlgorithm::Sha256;
        let payload = HeartbeatPayload::new(client, "1718000000.5", counter);
        let w_i = ChainValue::new(w);
        let mut bytes = encode_heartbeat(alg, &payload, &w_i);

        // Everything except the trailing "||" + authenticator
        let covered = bytes.len() - 34;
        let idx = flip_seed % covered;
        bytes[idx] ^= 0x01;

        // A flip may break parsing (e.g. a delimiter); that is also a rejection.
        if let Ok(msg) = decode_heartbeat(&bytes) {
            prop_assert!(!msg.authenticator_valid(alg));
        }
    }
}
