//! # Storage Module
//!
//! State the escrow engine treats as its execution environment. The devnet
//! keeps it in memory; a real deployment would back it with the host chain.

pub mod ledger;

pub use ledger::{AccountState, Ledger, LedgerError};
