//! # Signature Recovery
//!
//! Turns `(hash, 65-byte signature)` into the address that signed it. This is
//! the only authentication primitive delegated actions rely on: a sponsor
//! presents a borrower's signature and the engine recovers who produced it.
//!
//! ## Normalization
//!
//! The recovery byte `v` arrives as 27/28 from most wallets and as 0/1 from
//! some local chains. Both encode the same recovery id, so `v < 27` is lifted
//! by 27 before validation. After that only 27 and 28 are legal.
//!
//! High-`s` signatures are rejected: for every valid `(r, s)` the pair
//! `(r, n - s)` also verifies, and accepting both would give every signature a
//! second byte-distinct twin.
//!
//! Recovery says nothing about *what* was signed. Binding the hash to a
//! business message is the caller's job.

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, Secp256k1, VerifyOnly};
use thiserror::Error;

use crate::config::{COMPACT_SIGNATURE_LENGTH, RECOVERY_ID_OFFSET, SIGNATURE_LENGTH};
use crate::crypto::hash::signed_message_hash;
use crate::identity::Address;

/// Why a signature could not be turned into an address.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid signature length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("invalid recovery byte v={0}")]
    InvalidRecoveryId(u8),

    #[error("non-canonical signature: s is in the upper half of the curve order")]
    HighS,

    #[error("signature does not recover to a public key")]
    Unrecoverable,
}

/// Map a raw `v` byte onto the recovery id 0 or 1.
///
/// Accepts 0, 1, 27 and 28. Everything else is malformed.
pub fn normalize_recovery_byte(v: u8) -> Result<u8, SignatureError> {
    let canonical = if v < RECOVERY_ID_OFFSET {
        v + RECOVERY_ID_OFFSET
    } else {
        v
    };
    match canonical {
        27 | 28 => Ok(canonical - RECOVERY_ID_OFFSET),
        _ => Err(SignatureError::InvalidRecoveryId(v)),
    }
}

/// The recovery capability the escrow engine is parameterized over.
///
/// Kept as a trait so the engine can be exercised with a scripted recoverer
/// in tests, independent of real curve arithmetic.
pub trait SignerRecovery {
    /// Recover the signer of `hash` exactly as given.
    fn recover(&self, hash: &[u8; 32], signature: &[u8]) -> Result<Address, SignatureError>;

    /// Recover the signer of a digest that was signed in personal-message form.
    fn recover_signed_digest(
        &self,
        digest: &[u8; 32],
        signature: &[u8],
    ) -> Result<Address, SignatureError> {
        self.recover(&signed_message_hash(digest), signature)
    }
}

/// secp256k1 public-key recovery.
pub struct EcdsaRecovery {
    secp: Secp256k1<VerifyOnly>,
}

impl EcdsaRecovery {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::verification_only(),
        }
    }
}

impl Default for EcdsaRecovery {
    fn default() -> Self {
        Self::new()
    }
}

impl SignerRecovery for EcdsaRecovery {
    fn recover(&self, hash: &[u8; 32], signature: &[u8]) -> Result<Address, SignatureError> {
        if signature.len() != SIGNATURE_LENGTH {
            return Err(SignatureError::InvalidLength {
                expected: SIGNATURE_LENGTH,
                got: signature.len(),
            });
        }

        let raw_id = normalize_recovery_byte(signature[COMPACT_SIGNATURE_LENGTH])?;
        let recovery_id = RecoveryId::from_i32(i32::from(raw_id))
            .map_err(|_| SignatureError::InvalidRecoveryId(signature[COMPACT_SIGNATURE_LENGTH]))?;

        let recoverable =
            RecoverableSignature::from_compact(&signature[..COMPACT_SIGNATURE_LENGTH], recovery_id)
                .map_err(|_| SignatureError::Unrecoverable)?;

        let mut standard = recoverable.to_standard();
        let before = standard.serialize_compact();
        standard.normalize_s();
        if standard.serialize_compact() != before {
            return Err(SignatureError::HighS);
        }

        let message = Message::from_digest(*hash);
        let public_key = self
            .secp
            .recover_ecdsa(&message, &recoverable)
            .map_err(|_| SignatureError::Unrecoverable)?;

        Ok(Address::from_public_key(&public_key))
    }
}
