//! Integration tests for the LendPact protocol primitives.
//!
//! These exercise the public surface the escrow engine builds on: key
//! generation, address derivation, personal-message signing, signer
//! recovery, and custody movements on the simulated ledger.

use lendpact_protocol::crypto::{
    keccak256, keccak256_concat, selector, u128_word, u64_word, EcdsaRecovery, EcdsaSignature,
    LendKeypair, SignatureError, SignerRecovery,
};
use lendpact_protocol::identity::Address;
use lendpact_protocol::storage::{Ledger, LedgerError};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn key_one() -> LendKeypair {
    let mut secret = [0u8; 32];
    secret[31] = 1;
    LendKeypair::from_bytes(&secret).expect("1 is a valid scalar")
}

fn request_digest(amount: u128, ttl: u64) -> [u8; 32] {
    keccak256_concat(&[&u128_word(amount), &u64_word(ttl)])
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

#[test]
fn keccak_matches_known_vectors() {
    assert_eq!(
        hex::encode(keccak256(b"")),
        "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
    );
    assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
}

#[test]
fn words_are_big_endian_and_padded() {
    let word = u128_word(0x0102);
    assert!(word[..30].iter().all(|b| *b == 0));
    assert_eq!(&word[30..], &[0x01, 0x02]);
    assert_eq!(u64_word(7), u128_word(7));
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[test]
fn address_derivation_matches_known_key() {
    assert_eq!(
        key_one().address().to_hex(),
        "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
    );
}

#[test]
fn address_survives_text_and_json() {
    let address = LendKeypair::generate().address();
    let parsed: Address = address.to_string().parse().unwrap();
    assert_eq!(parsed, address);

    let json = serde_json::to_string(&address).unwrap();
    let back: Address = serde_json::from_str(&json).unwrap();
    assert_eq!(back, address);
}

// ---------------------------------------------------------------------------
// Sign / Recover
// ---------------------------------------------------------------------------

#[test]
fn personal_signature_recovers_signer() {
    let keypair = LendKeypair::generate();
    let digest = request_digest(1_000, 500);
    let signature = keypair.sign_digest(&digest);

    let signer = EcdsaRecovery::new()
        .recover_signed_digest(&digest, signature.as_bytes())
        .unwrap();
    assert_eq!(signer, keypair.address());
}

#[test]
fn low_v_and_hex_round_trip_recover_same_signer() {
    let keypair = LendKeypair::generate();
    let digest = keccak256_concat(&[&selector("takeLoan(bytes32)"), &[9u8; 32]]);
    let signature = keypair.sign_digest(&digest).with_low_v();
    assert!(signature.as_bytes()[64] < 27);

    let reparsed: EcdsaSignature = signature.to_hex().parse().unwrap();
    let signer = EcdsaRecovery::new()
        .recover_signed_digest(&digest, reparsed.as_bytes())
        .unwrap();
    assert_eq!(signer, keypair.address());
}

#[test]
fn signature_over_other_terms_recovers_other_address() {
    let keypair = LendKeypair::generate();
    let signature = keypair.sign_digest(&request_digest(1_000, 500));

    let signer = EcdsaRecovery::new()
        .recover_signed_digest(&request_digest(1_001, 500), signature.as_bytes())
        .unwrap();
    assert_ne!(signer, keypair.address());
}

#[test]
fn truncated_signature_is_rejected() {
    let keypair = LendKeypair::generate();
    let digest = request_digest(1, 1);
    let signature = keypair.sign_digest(&digest);

    let err = EcdsaRecovery::new()
        .recover_signed_digest(&digest, &signature.as_bytes()[..64])
        .unwrap_err();
    assert_eq!(
        err,
        SignatureError::InvalidLength {
            expected: 65,
            got: 64
        }
    );
}

// ---------------------------------------------------------------------------
// Ledger Custody
// ---------------------------------------------------------------------------

#[test]
fn custody_round_trip_conserves_value() {
    let funder = LendKeypair::generate().address();
    let receiver = LendKeypair::generate().address();
    let mut ledger = Ledger::new();
    ledger.mint(funder, 10_000).unwrap();

    ledger.lock_into_custody(&funder, 4_000).unwrap();
    assert_eq!(ledger.custody(), 4_000);
    assert_eq!(ledger.balance_of(&funder), 6_000);

    ledger.release_from_custody(&receiver, 4_000).unwrap();
    assert_eq!(ledger.custody(), 0);
    assert_eq!(ledger.balance_of(&receiver), 4_000);
    assert_eq!(ledger.total_value(), 10_000);
}

#[test]
fn failed_movements_leave_ledger_untouched() {
    let funder = LendKeypair::generate().address();
    let receiver = LendKeypair::generate().address();
    let mut ledger = Ledger::new();
    ledger.mint(funder, 100).unwrap();

    assert!(matches!(
        ledger.lock_into_custody(&funder, 101),
        Err(LedgerError::InsufficientBalance { .. })
    ));

    ledger.lock_into_custody(&funder, 100).unwrap();
    ledger.set_frozen(receiver, true);
    assert_eq!(
        ledger.release_from_custody(&receiver, 100),
        Err(LedgerError::Frozen(receiver))
    );
    assert_eq!(ledger.custody(), 100);
    assert_eq!(ledger.balance_of(&receiver), 0);
}

#[test]
fn block_height_only_moves_forward() {
    let mut ledger = Ledger::at_height(u64::MAX - 1);
    assert_eq!(ledger.advance(5), u64::MAX);
    assert_eq!(ledger.block_height(), u64::MAX);
}
