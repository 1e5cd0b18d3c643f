//! # Cryptographic Primitives for LendPact
//!
//! - **Keccak-256** for every digest and for address derivation.
//! - **secp256k1 ECDSA with recovery** for delegated authorization: the
//!   engine learns who signed from the signature itself.
//!
//! Everything here wraps audited implementations (`sha3`, `secp256k1`).

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{keccak256, keccak256_concat, selector, signed_message_hash, u128_word, u64_word};
pub use keys::{EcdsaSignature, KeyError, LendKeypair};
pub use signatures::{EcdsaRecovery, SignatureError, SignerRecovery};
