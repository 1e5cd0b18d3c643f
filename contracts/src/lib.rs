//! # LendPact Loan Escrow
//!
//! Peer-to-peer loans held in escrow. A receiver asks for a principal, a
//! funder locks exactly that principal into custody, and the receiver either
//! takes it or refuses it (refunding the funder). A request nobody funded can
//! be canceled. A sponsor may request, take or refuse on a receiver's behalf
//! by presenting the receiver's signature over the matching digest.
//!
//! - [`loan`]: identifiers, status and the stored record.
//! - [`registry`]: total map from identifier to record.
//! - [`gateway`]: value movement into and out of custody.
//! - [`authorization`]: the digests receivers sign for sponsors.
//! - [`loan_escrow`]: the lifecycle engine tying the above together.
//!
//! ## Invariants
//!
//! 1. Status only moves along the lifecycle graph; terminal states are final.
//! 2. Custody always equals the sum of principals of `Approved` loans.
//! 3. A rejected operation changes no record, no balance and no journal entry.

pub mod authorization;
pub mod error;
pub mod events;
pub mod gateway;
pub mod id_generator;
pub mod loan;
pub mod loan_escrow;
pub mod registry;

pub use error::{ErrorKind, EscrowError, SignatureFault, SolvencyError};
pub use events::{JournalEntry, LoanEvent};
pub use gateway::{EscrowGateway, TransferError};
pub use loan::{LoanId, LoanRecord, LoanStatus};
pub use loan_escrow::{CallContext, CancelPolicy, EscrowConfig, LoanEscrow};
pub use registry::{LoanStore, MemoryRegistry};
