//! # Key Management
//!
//! secp256k1 keypairs and the 65-byte recoverable signatures they produce.
//!
//! The escrow engine never holds keys: it only recovers addresses from
//! signatures. Keypairs exist for the other side of the exchange, the
//! borrower's wallet, and show up in the node's `sign` helper and in tests.
//!
//! Key bytes are never logged.

use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::hash::signed_message_hash;
use crate::config::{RECOVERY_ID_OFFSET, SECRET_KEY_LENGTH, SIGNATURE_LENGTH};
use crate::identity::Address;

/// Errors that can occur during key operations.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not a valid scalar")]
    InvalidSecretKey,

    #[error("invalid signature encoding: {0}")]
    InvalidSignatureEncoding(String),
}

/// A secp256k1 keypair.
///
/// Deliberately not `Serialize`. Export the secret with
/// [`secret_key_bytes`](Self::secret_key_bytes) when you mean to.
pub struct LendKeypair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

/// A 65-byte `r || s || v` signature as it travels between wallet and engine.
///
/// Always 65 bytes when produced by [`LendKeypair`]; anything parsed from the
/// outside world may be malformed, and recovery is where that gets rejected.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EcdsaSignature {
    bytes: Vec<u8>,
}

impl LendKeypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Rebuild a keypair from raw 32-byte secret key material.
    pub fn from_bytes(secret_key_bytes: &[u8; SECRET_KEY_LENGTH]) -> Result<Self, KeyError> {
        let secret_key =
            SecretKey::from_slice(secret_key_bytes).map_err(|_| KeyError::InvalidSecretKey)?;
        let public_key = PublicKey::from_secret_key(&Secp256k1::signing_only(), &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// Rebuild a keypair from a hex-encoded secret key (`0x` optional).
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let raw = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let bytes = hex::decode(raw).map_err(|_| KeyError::InvalidSecretKey)?;
        if bytes.len() != SECRET_KEY_LENGTH {
            return Err(KeyError::InvalidSecretKey);
        }
        let mut arr = [0u8; SECRET_KEY_LENGTH];
        arr.copy_from_slice(&bytes);
        Self::from_bytes(&arr)
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public_key)
    }

    pub fn secret_key_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.secret_key.secret_bytes()
    }

    /// Sign a 32-byte hash as-is. `v` is emitted as 27/28.
    pub fn sign_prehashed(&self, hash: &[u8; 32]) -> EcdsaSignature {
        let secp = Secp256k1::signing_only();
        let message = Message::from_digest(*hash);
        let signature = secp.sign_ecdsa_recoverable(&message, &self.secret_key);
        let (recovery_id, compact) = signature.serialize_compact();

        let mut bytes = Vec::with_capacity(SIGNATURE_LENGTH);
        bytes.extend_from_slice(&compact);
        bytes.push(recovery_id.to_i32() as u8 + RECOVERY_ID_OFFSET);
        EcdsaSignature { bytes }
    }

    /// Sign a digest the way a wallet's personal-sign does: the digest is
    /// wrapped in the signed-message envelope first.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> EcdsaSignature {
        self.sign_prehashed(&signed_message_hash(digest))
    }
}

impl fmt::Debug for LendKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LendKeypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl EcdsaSignature {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Re-encode `v` as 0/1, the form some local test chains return.
    /// Verification must accept both.
    pub fn with_low_v(mut self) -> Self {
        if let Some(v) = self.bytes.last_mut() {
            if *v >= RECOVERY_ID_OFFSET {
                *v -= RECOVERY_ID_OFFSET;
            }
        }
        self
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.bytes))
    }
}

impl FromStr for EcdsaSignature {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes =
            hex::decode(raw).map_err(|e| KeyError::InvalidSignatureEncoding(e.to_string()))?;
        Ok(Self { bytes })
    }
}

impl fmt::Display for EcdsaSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for EcdsaSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EcdsaSignature({})", self.to_hex())
    }
}

impl Serialize for EcdsaSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EcdsaSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
