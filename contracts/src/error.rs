//! Error types for the loan escrow.
//!
//! Every lifecycle operation that fails returns an [`EscrowError`] and leaves
//! the registry, the custody balance and the event journal untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use lendpact_protocol::crypto::SignatureError;
use lendpact_protocol::identity::Address;

use crate::gateway::TransferError;
use crate::loan::{LoanId, LoanStatus};

/// Errors that abort a lifecycle operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EscrowError {
    /// Zero principal at creation, attached value not matching the principal
    /// at approval, or value attached to an operation that takes none.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The requested ttl is not strictly after the current block.
    #[error("invalid ttl: {ttl} is not after current block {current_height}")]
    InvalidTtl {
        /// The ttl supplied with the request.
        ttl: u64,
        /// Block height at the time of the call.
        current_height: u64,
    },

    /// The record is not in the status this operation requires.
    #[error("invalid state transition: loan {id} is {current}, expected {expected}")]
    InvalidState {
        id: LoanId,
        current: LoanStatus,
        expected: LoanStatus,
    },

    /// The caller (or the identity a sponsor acts for) is not allowed to
    /// perform this operation.
    #[error("unauthorized: {caller} is not {expected}")]
    Unauthorized { caller: Address, expected: Address },

    /// The delegation signature is malformed or was not produced by the
    /// identity the sponsor claims to act for.
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureFault),

    /// The escrow gateway could not move the value.
    #[error("transfer failed: {0}")]
    TransferFailed(#[from] TransferError),
}

/// What exactly was wrong with a delegation signature.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureFault {
    #[error(transparent)]
    Malformed(#[from] SignatureError),

    #[error("recovered signer {recovered} does not match {expected}")]
    SignerMismatch { recovered: Address, expected: Address },
}

impl From<SignatureError> for EscrowError {
    fn from(err: SignatureError) -> Self {
        EscrowError::InvalidSignature(SignatureFault::Malformed(err))
    }
}

/// Fieldless classification of [`EscrowError`], for callers that branch on
/// the kind of failure and for wire responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidAmount,
    InvalidTtl,
    InvalidState,
    Unauthorized,
    InvalidSignature,
    TransferFailed,
}

impl EscrowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EscrowError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            EscrowError::InvalidTtl { .. } => ErrorKind::InvalidTtl,
            EscrowError::InvalidState { .. } => ErrorKind::InvalidState,
            EscrowError::Unauthorized { .. } => ErrorKind::Unauthorized,
            EscrowError::InvalidSignature(_) => ErrorKind::InvalidSignature,
            EscrowError::TransferFailed(_) => ErrorKind::TransferFailed,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidAmount => "InvalidAmount",
            ErrorKind::InvalidTtl => "InvalidTtl",
            ErrorKind::InvalidState => "InvalidState",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::InvalidSignature => "InvalidSignature",
            ErrorKind::TransferFailed => "TransferFailed",
        };
        f.write_str(name)
    }
}

/// Custody disagrees with the records. Reported by
/// [`LoanEscrow::check_solvency`](crate::loan_escrow::LoanEscrow::check_solvency).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SolvencyError {
    #[error("escrow insolvent: custody holds {custody}, approved loans total {approved}")]
    Mismatch { custody: u128, approved: u128 },

    #[error("approved loan total overflows u128")]
    Overflow,
}
