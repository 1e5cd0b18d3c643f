//! # Hashing Utilities
//!
//! Keccak-256 and the packed encodings LendPact hashes over.
//!
//! All digests in the protocol are built the same way: fixed-width fields are
//! concatenated without padding between them (integers widened to a 32-byte
//! big-endian word first), then the whole preimage is hashed once. That is
//! the EVM "packed" encoding, which keeps digests reproducible from any
//! wallet library.

use sha3::{Digest, Keccak256};

use crate::config::{SELECTOR_LENGTH, SIGNED_MESSAGE_PREFIX, WORD_LENGTH};

/// Compute the Keccak-256 hash of the input data.
///
/// # Example
///
/// ```
/// use lendpact_protocol::crypto::keccak256;
///
/// let hash = keccak256(b"");
/// assert_eq!(
///     hex::encode(hash),
///     "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
/// );
/// ```
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash several byte slices as if they had been concatenated first.
///
/// Saves the caller an intermediate `Vec` when the pieces are already
/// laid out in separate buffers.
pub fn keccak256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Encode a `u128` as a 32-byte big-endian word.
pub fn u128_word(value: u128) -> [u8; WORD_LENGTH] {
    let mut word = [0u8; WORD_LENGTH];
    word[WORD_LENGTH - 16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Encode a `u64` as a 32-byte big-endian word.
pub fn u64_word(value: u64) -> [u8; WORD_LENGTH] {
    let mut word = [0u8; WORD_LENGTH];
    word[WORD_LENGTH - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Derive the 4-byte discriminator of an operation from its canonical
/// signature string, e.g. `"takeLoan(bytes32)"`.
pub fn selector(signature: &str) -> [u8; SELECTOR_LENGTH] {
    let h = keccak256(signature.as_bytes());
    [h[0], h[1], h[2], h[3]]
}

/// Wrap a 32-byte digest in the personal-message envelope wallets sign.
///
/// ```text
/// keccak256("\x19Ethereum Signed Message:\n32" || digest)
/// ```
pub fn signed_message_hash(digest: &[u8; 32]) -> [u8; 32] {
    keccak256_concat(&[SIGNED_MESSAGE_PREFIX, digest])
}
