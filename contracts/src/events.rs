//! # Event Journal
//!
//! Every committed transition appends one [`LoanEvent`]. Rejected operations
//! append nothing, so the journal replays exactly the history the registry
//! reflects. Creation events are also how a caller that did not get the
//! return value (e.g. a sponsor's client) discovers a new identifier.

use serde::{Deserialize, Serialize};

use lendpact_protocol::identity::Address;

use crate::loan::LoanId;

/// A committed lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanEvent {
    Requested {
        id: LoanId,
        receiver: Address,
        /// Set when a sponsor submitted the request.
        sponsor: Option<Address>,
        amount: u128,
        ttl: u64,
    },
    Approved {
        id: LoanId,
        funder: Address,
        amount: u128,
    },
    Taken {
        id: LoanId,
        receiver: Address,
        sponsor: Option<Address>,
        amount: u128,
    },
    Refused {
        id: LoanId,
        funder: Address,
        sponsor: Option<Address>,
        amount: u128,
    },
    Canceled {
        id: LoanId,
        by: Address,
    },
}

impl LoanEvent {
    pub fn id(&self) -> LoanId {
        match self {
            LoanEvent::Requested { id, .. }
            | LoanEvent::Approved { id, .. }
            | LoanEvent::Taken { id, .. }
            | LoanEvent::Refused { id, .. }
            | LoanEvent::Canceled { id, .. } => *id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LoanEvent::Requested { .. } => "requested",
            LoanEvent::Approved { .. } => "approved",
            LoanEvent::Taken { .. } => "taken",
            LoanEvent::Refused { .. } => "refused",
            LoanEvent::Canceled { .. } => "canceled",
        }
    }
}

/// A journal slot: the event plus where it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position in the journal, starting at 0.
    pub sequence: u64,
    /// Block height of the call that produced the event.
    pub block_height: u64,
    pub event: LoanEvent,
}
