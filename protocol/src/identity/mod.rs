//! # Identity Module
//!
//! Participants are identified by 20-byte addresses derived from their
//! secp256k1 public keys. An address is all the engine ever stores; the
//! public key only shows up transiently, recovered from a signature.

pub mod address;

pub use address::{Address, AddressError};
