//! # Delegated Authorization Digests
//!
//! A sponsor acts for a receiver by presenting the receiver's signature over
//! the digest of one specific action. The digests:
//!
//! | Action  | Preimage                                             |
//! |---------|------------------------------------------------------|
//! | request | `be32(amount) \|\| be32(ttl)`                        |
//! | take    | `selector("takeLoan(bytes32)") \|\| id`              |
//! | refuse  | `selector("refuseLoan(bytes32)") \|\| id`            |
//!
//! Take and refuse carry a per-operation discriminator and the identifier, so
//! a signature for one action or one loan cannot be replayed as another. The
//! request digest binds only the terms: a receiver's consent to borrow a given
//! amount until a given height can be submitted by any sponsor, any number of
//! times.
//!
//! Receivers sign these digests in personal-message form.

use lendpact_protocol::config::{REFUSE_LOAN_SIGNATURE, TAKE_LOAN_SIGNATURE};
use lendpact_protocol::crypto::{keccak256_concat, selector, u128_word, u64_word};

use crate::loan::LoanId;

/// An action a receiver can authorize a sponsor to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegatedAction {
    Request { amount: u128, ttl: u64 },
    Take { id: LoanId },
    Refuse { id: LoanId },
}

impl DelegatedAction {
    /// The digest the receiver signs for this action.
    pub fn digest(&self) -> [u8; 32] {
        match self {
            DelegatedAction::Request { amount, ttl } => request_digest(*amount, *ttl),
            DelegatedAction::Take { id } => take_digest(id),
            DelegatedAction::Refuse { id } => refuse_digest(id),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DelegatedAction::Request { .. } => "request",
            DelegatedAction::Take { .. } => "take",
            DelegatedAction::Refuse { .. } => "refuse",
        }
    }
}

pub fn request_digest(amount: u128, ttl: u64) -> [u8; 32] {
    keccak256_concat(&[&u128_word(amount), &u64_word(ttl)])
}

pub fn take_digest(id: &LoanId) -> [u8; 32] {
    keccak256_concat(&[&selector(TAKE_LOAN_SIGNATURE), id.as_bytes()])
}

pub fn refuse_digest(id: &LoanId) -> [u8; 32] {
    keccak256_concat(&[&selector(REFUSE_LOAN_SIGNATURE), id.as_bytes()])
}
