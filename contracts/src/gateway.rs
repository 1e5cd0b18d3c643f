//! # Escrow Transfer Gateway
//!
//! The only path value takes into or out of escrow custody. The engine calls
//! it at most once per transition and commits the new loan status only after
//! the call returns `Ok`, so a failed movement leaves nothing behind.

use thiserror::Error;

use lendpact_protocol::identity::Address;
use lendpact_protocol::storage::{Ledger, LedgerError};

/// A value movement the environment refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// Moves value between participants and escrow custody.
pub trait EscrowGateway {
    /// Take `amount` from `from` into custody. Backs the value attached to
    /// an approval.
    fn receive(&mut self, from: &Address, amount: u128) -> Result<(), TransferError>;

    /// Pay `amount` out of custody to `to`.
    fn transfer(&mut self, to: &Address, amount: u128) -> Result<(), TransferError>;

    /// Total value currently in custody.
    fn custody(&self) -> u128;
}

impl EscrowGateway for Ledger {
    fn receive(&mut self, from: &Address, amount: u128) -> Result<(), TransferError> {
        self.lock_into_custody(from, amount)?;
        Ok(())
    }

    fn transfer(&mut self, to: &Address, amount: u128) -> Result<(), TransferError> {
        self.release_from_custody(to, amount)?;
        Ok(())
    }

    fn custody(&self) -> u128 {
        Ledger::custody(self)
    }
}
