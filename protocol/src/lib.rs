// Copyright (c) 2026 LendPact Contributors. MIT License.
// See LICENSE for details.

//! # LendPact Protocol Core Library
//!
//! Primitives shared by the loan escrow contract and the devnet node.
//!
//! ## Architecture
//!
//! - **crypto**: Keccak-256 digests, secp256k1 keys, signature recovery.
//! - **identity**: 20-byte addresses derived from public keys.
//! - **storage**: the simulated ledger (balances, custody, block height).
//! - **config**: protocol constants and devnet defaults.

pub mod config;
pub mod crypto;
pub mod identity;
pub mod storage;
