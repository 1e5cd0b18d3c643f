//! # Loan Records
//!
//! The single persistent entity of the escrow and the identifiers it is
//! stored under.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use lendpact_protocol::config::LOAN_ID_LENGTH;
use lendpact_protocol::identity::Address;

// ---------------------------------------------------------------------------
// LoanId
// ---------------------------------------------------------------------------

/// Errors parsing a loan identifier or status from outside input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseLoanError {
    #[error("invalid loan id: {0}")]
    InvalidId(String),

    #[error("unknown loan status discriminant {0}")]
    UnknownStatus(u8),
}

/// A 32-byte opaque loan identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoanId([u8; LOAN_ID_LENGTH]);

impl LoanId {
    pub const fn from_bytes(bytes: [u8; LOAN_ID_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; LOAN_ID_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl FromStr for LoanId {
    type Err = ParseLoanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).map_err(|e| ParseLoanError::InvalidId(e.to_string()))?;
        if bytes.len() != LOAN_ID_LENGTH {
            return Err(ParseLoanError::InvalidId(format!(
                "expected {} bytes, got {}",
                LOAN_ID_LENGTH,
                bytes.len()
            )));
        }
        let mut out = [0u8; LOAN_ID_LENGTH];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoanId({})", self.to_hex())
    }
}

impl Serialize for LoanId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for LoanId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// LoanStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a loan request.
///
/// ```text
/// Empty ──request──▶ Created ──approve──▶ Approved ──take────▶ Completed
///                       │                    └───────refuse──▶ Refused
///                       └──cancel──▶ Canceled
/// ```
///
/// The discriminants are part of the external interface and never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum LoanStatus {
    /// No request exists under this identifier.
    #[default]
    Empty = 0,
    /// Requested by (or on behalf of) the receiver; awaiting a funder.
    Created = 1,
    /// Funded; the principal sits in escrow.
    Approved = 2,
    /// Withdrawn before anyone funded it.
    Canceled = 3,
    /// Declined by the receiver; principal returned to the funder.
    Refused = 4,
    /// Claimed by the receiver.
    Completed = 5,
}

impl LoanStatus {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        match self {
            LoanStatus::Canceled | LoanStatus::Refused | LoanStatus::Completed => true,
            LoanStatus::Empty | LoanStatus::Created | LoanStatus::Approved => false,
        }
    }
}

impl TryFrom<u8> for LoanStatus {
    type Error = ParseLoanError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LoanStatus::Empty),
            1 => Ok(LoanStatus::Created),
            2 => Ok(LoanStatus::Approved),
            3 => Ok(LoanStatus::Canceled),
            4 => Ok(LoanStatus::Refused),
            5 => Ok(LoanStatus::Completed),
            other => Err(ParseLoanError::UnknownStatus(other)),
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoanStatus::Empty => "Empty",
            LoanStatus::Created => "Created",
            LoanStatus::Approved => "Approved",
            LoanStatus::Canceled => "Canceled",
            LoanStatus::Refused => "Refused",
            LoanStatus::Completed => "Completed",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// LoanRecord
// ---------------------------------------------------------------------------

/// A loan request as stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRecord {
    /// Principal requested, in value units. Non-zero for every stored record.
    pub amount: u128,
    /// Borrower entitled to take or refuse. Immutable after creation.
    pub receiver: Address,
    /// Block height after which the request is considered expired.
    pub ttl: u64,
    /// Current lifecycle state.
    pub status: LoanStatus,
    /// Whoever supplied the escrowed value at approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funder: Option<Address>,
}

impl LoanRecord {
    /// The sentinel returned for identifiers that were never created.
    pub fn empty() -> Self {
        Self {
            amount: 0,
            receiver: Address::ZERO,
            ttl: 0,
            status: LoanStatus::Empty,
            funder: None,
        }
    }

    pub(crate) fn created(amount: u128, receiver: Address, ttl: u64) -> Self {
        Self {
            amount,
            receiver,
            ttl,
            status: LoanStatus::Created,
            funder: None,
        }
    }

    /// Advisory only: no transition consults it.
    pub fn is_expired(&self, block_height: u64) -> bool {
        self.status != LoanStatus::Empty && block_height > self.ttl
    }

    /// Value attributable to this record in escrow custody.
    pub fn escrowed(&self) -> u128 {
        match self.status {
            LoanStatus::Approved => self.amount,
            _ => 0,
        }
    }
}

impl Default for LoanRecord {
    fn default() -> Self {
        Self::empty()
    }
}
