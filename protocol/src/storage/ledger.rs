//! # Ledger -- Simulated Execution Environment
//!
//! The escrow engine assumes an environment that moves value atomically,
//! keeps balances, and counts blocks. `Ledger` is that environment for the
//! devnet node and for tests: a flat map of account balances, one custody
//! balance held on behalf of the escrow, and a monotonic block height.
//!
//! ## Value movements
//!
//! Only two movements involve custody:
//!
//! 1. `lock_into_custody(from, A)`: `from.balance -= A`, `custody += A`
//! 2. `release_from_custody(to, A)`: `custody -= A`, `to.balance += A`
//!
//! Each one checks everything before it mutates anything, so a failed
//! movement leaves the ledger untouched. The sum of all balances plus custody
//! only changes through [`Ledger::mint`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::identity::Address;

/// Errors from ledger value movements.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient balance for {address}: have {available}, need {requested}")]
    InsufficientBalance {
        address: Address,
        available: u128,
        requested: u128,
    },

    #[error("insufficient custody: holding {available}, need {requested}")]
    InsufficientCustody { available: u128, requested: u128 },

    #[error("account {0} is frozen and cannot send or receive value")]
    Frozen(Address),

    #[error("balance overflow crediting {0}")]
    Overflow(Address),
}

// ---------------------------------------------------------------------------
// AccountState
// ---------------------------------------------------------------------------

/// The ledger-side state of a single account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Spendable balance in value units.
    pub balance: u128,
    /// Frozen accounts reject every inbound and outbound movement.
    pub frozen: bool,
}

impl AccountState {
    pub fn with_balance(balance: u128) -> Self {
        Self {
            balance,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// In-memory balances, escrow custody and block height.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: HashMap<Address, AccountState>,
    custody: u128,
    block_height: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at a given height, for tests that need a specific clock.
    pub fn at_height(block_height: u64) -> Self {
        Self {
            block_height,
            ..Default::default()
        }
    }

    pub fn block_height(&self) -> u64 {
        self.block_height
    }

    /// Advance the clock by `blocks`. Saturates instead of wrapping.
    pub fn advance(&mut self, blocks: u64) -> u64 {
        self.block_height = self.block_height.saturating_add(blocks);
        self.block_height
    }

    pub fn account(&self, address: &Address) -> Option<&AccountState> {
        self.accounts.get(address)
    }

    /// Balance of `address`; zero for accounts never seen.
    pub fn balance_of(&self, address: &Address) -> u128 {
        self.accounts.get(address).map(|a| a.balance).unwrap_or(0)
    }

    /// Value currently held on behalf of the escrow.
    pub fn custody(&self) -> u128 {
        self.custody
    }

    /// Create new value in `address`'s account (devnet faucet).
    pub fn mint(&mut self, address: Address, amount: u128) -> Result<u128, LedgerError> {
        let account = self.accounts.entry(address).or_default();
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow(address))?;
        tracing::debug!(%address, amount, balance = account.balance, "minted");
        Ok(account.balance)
    }

    pub fn set_frozen(&mut self, address: Address, frozen: bool) {
        self.accounts.entry(address).or_default().frozen = frozen;
    }

    /// Move `amount` from `from`'s balance into custody.
    pub fn lock_into_custody(&mut self, from: &Address, amount: u128) -> Result<(), LedgerError> {
        let account = self.accounts.get(from).cloned().unwrap_or_default();
        if account.frozen {
            return Err(LedgerError::Frozen(*from));
        }
        if account.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                address: *from,
                available: account.balance,
                requested: amount,
            });
        }
        let new_custody = self
            .custody
            .checked_add(amount)
            .ok_or(LedgerError::Overflow(*from))?;

        self.accounts.entry(*from).or_default().balance -= amount;
        self.custody = new_custody;
        Ok(())
    }

    /// Move `amount` out of custody into `to`'s balance.
    pub fn release_from_custody(&mut self, to: &Address, amount: u128) -> Result<(), LedgerError> {
        if self.custody < amount {
            return Err(LedgerError::InsufficientCustody {
                available: self.custody,
                requested: amount,
            });
        }
        let account = self.accounts.get(to).cloned().unwrap_or_default();
        if account.frozen {
            return Err(LedgerError::Frozen(*to));
        }
        let new_balance = account
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow(*to))?;

        self.custody -= amount;
        self.accounts.entry(*to).or_default().balance = new_balance;
        Ok(())
    }

    /// Sum of every balance plus custody. Constant across custody movements.
    pub fn total_value(&self) -> u128 {
        self.accounts
            .values()
            .fold(self.custody, |acc, a| acc.saturating_add(a.balance))
    }

    /// Accounts ordered by address, for deterministic listings.
    pub fn accounts(&self) -> BTreeMap<Address, AccountState> {
        self.accounts
            .iter()
            .map(|(addr, state)| (*addr, state.clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
