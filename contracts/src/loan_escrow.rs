//! # Loan Escrow Lifecycle
//!
//! The state machine behind every loan:
//!
//! ```text
//!            request            approve             take
//!   Empty ─────────────▶ Created ─────────▶ Approved ─────────▶ Completed
//!                           │                   │
//!                    cancel │                   │ refuse
//!                           ▼                   ▼
//!                       Canceled             Refused
//! ```
//!
//! 1. **Request.** A receiver (or a sponsor holding the receiver's
//!    signature) records the principal and ttl. No value moves.
//! 2. **Approve.** A funder attaches exactly the principal, which moves
//!    into escrow custody.
//! 3. **Take.** The receiver (or sponsor) accepts; custody pays the
//!    receiver.
//! 4. **Refuse.** The receiver (or sponsor) declines; custody refunds the
//!    funder.
//! 5. **Cancel.** A request that was never funded is withdrawn.
//!
//! Checks run in a fixed order: attached value, delegation signature, record
//! status, caller identity, value movement. Only after all of them pass is
//! the new record written and the event appended, so a rejected call
//! changes nothing.
//!
//! The ttl is recorded and exposed through [`LoanRecord::is_expired`] but
//! never gates a transition.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use lendpact_protocol::crypto::{EcdsaRecovery, SignerRecovery};
use lendpact_protocol::identity::Address;
use lendpact_protocol::storage::Ledger;

use crate::authorization::DelegatedAction;
use crate::error::{EscrowError, SignatureFault, SolvencyError};
use crate::events::{JournalEntry, LoanEvent};
use crate::gateway::EscrowGateway;
use crate::id_generator::IdGenerator;
use crate::loan::{LoanId, LoanRecord, LoanStatus};
use crate::registry::{LoanStore, MemoryRegistry};

// ---------------------------------------------------------------------------
// Call context and configuration
// ---------------------------------------------------------------------------

/// Who is calling, what value they attached, and at which block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub origin: Address,
    pub value: u128,
    pub block_height: u64,
}

impl CallContext {
    /// A call with no attached value.
    pub fn new(origin: Address, block_height: u64) -> Self {
        Self {
            origin,
            value: 0,
            block_height,
        }
    }

    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }
}

/// Who may cancel a `Created` loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelPolicy {
    /// Only the configured administrator.
    #[default]
    Administrator,
    /// Any caller.
    Open,
}

impl fmt::Display for CancelPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelPolicy::Administrator => f.write_str("administrator"),
            CancelPolicy::Open => f.write_str("open"),
        }
    }
}

impl FromStr for CancelPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "administrator" | "admin" => Ok(CancelPolicy::Administrator),
            "open" => Ok(CancelPolicy::Open),
            other => Err(format!(
                "unknown cancel policy '{other}', expected 'administrator' or 'open'"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowConfig {
    /// The identity allowed to cancel under [`CancelPolicy::Administrator`].
    pub administrator: Address,
    #[serde(default)]
    pub cancel_policy: CancelPolicy,
}

impl EscrowConfig {
    pub fn new(administrator: Address) -> Self {
        Self {
            administrator,
            cancel_policy: CancelPolicy::default(),
        }
    }

    pub fn with_cancel_policy(mut self, cancel_policy: CancelPolicy) -> Self {
        self.cancel_policy = cancel_policy;
        self
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Settlement {
    Take,
    Refuse,
}

/// The loan escrow: registry, custody gateway and signature verifier behind
/// one set of lifecycle operations.
pub struct LoanEscrow<S = MemoryRegistry, G = Ledger, V = EcdsaRecovery> {
    config: EscrowConfig,
    registry: S,
    gateway: G,
    verifier: V,
    ids: IdGenerator,
    events: Vec<JournalEntry>,
}

impl LoanEscrow {
    /// In-memory registry, ledger-backed custody and secp256k1 recovery.
    pub fn with_ledger(config: EscrowConfig, ledger: Ledger) -> Self {
        Self::new(config, MemoryRegistry::new(), ledger, EcdsaRecovery::new())
    }
}

impl<S: LoanStore, G: EscrowGateway, V: SignerRecovery> LoanEscrow<S, G, V> {
    pub fn new(config: EscrowConfig, registry: S, gateway: G, verifier: V) -> Self {
        Self {
            config,
            registry,
            gateway,
            verifier,
            ids: IdGenerator::new(),
            events: Vec::new(),
        }
    }

    // -- Creation ----------------------------------------------------------

    /// Record a request from `ctx.origin` for `amount`, nominally repaid by
    /// block `ttl`. Returns the fresh identifier.
    pub fn request_loan(
        &mut self,
        ctx: &CallContext,
        amount: u128,
        ttl: u64,
    ) -> Result<LoanId, EscrowError> {
        self.try_request(ctx, amount, ttl)
            .map_err(|e| rejected("request_loan", ctx, e))
    }

    fn try_request(
        &mut self,
        ctx: &CallContext,
        amount: u128,
        ttl: u64,
    ) -> Result<LoanId, EscrowError> {
        ensure_no_value(ctx)?;
        validate_terms(ctx, amount, ttl)?;
        self.create(ctx, amount, ttl, ctx.origin, None)
    }

    /// Record a request on behalf of `receiver`, authorized by the
    /// receiver's signature over the request digest.
    pub fn sponsorship_request_loan(
        &mut self,
        ctx: &CallContext,
        amount: u128,
        ttl: u64,
        receiver: Address,
        signature: &[u8],
    ) -> Result<LoanId, EscrowError> {
        self.try_sponsored_request(ctx, amount, ttl, receiver, signature)
            .map_err(|e| rejected("sponsorship_request_loan", ctx, e))
    }

    fn try_sponsored_request(
        &mut self,
        ctx: &CallContext,
        amount: u128,
        ttl: u64,
        receiver: Address,
        signature: &[u8],
    ) -> Result<LoanId, EscrowError> {
        ensure_no_value(ctx)?;
        validate_terms(ctx, amount, ttl)?;
        self.verify_delegation(&DelegatedAction::Request { amount, ttl }, &receiver, signature)?;
        self.create(ctx, amount, ttl, receiver, Some(ctx.origin))
    }

    fn create(
        &mut self,
        ctx: &CallContext,
        amount: u128,
        ttl: u64,
        receiver: Address,
        sponsor: Option<Address>,
    ) -> Result<LoanId, EscrowError> {
        let id = self.ids.peek(amount, ttl, &receiver);
        let existing = self.registry.get(&id);
        if existing.status != LoanStatus::Empty {
            return Err(EscrowError::InvalidState {
                id,
                current: existing.status,
                expected: LoanStatus::Empty,
            });
        }

        self.ids.advance();
        self.registry
            .put(id, LoanRecord::created(amount, receiver, ttl));
        self.emit(
            ctx,
            LoanEvent::Requested {
                id,
                receiver,
                sponsor,
                amount,
                ttl,
            },
        );

        info!(
            loan_id = %id,
            receiver = %receiver,
            sponsored = sponsor.is_some(),
            amount,
            ttl,
            "loan requested"
        );
        Ok(id)
    }

    // -- Funding -----------------------------------------------------------

    /// Fund a `Created` loan. `ctx.value` must equal the principal exactly;
    /// it moves from `ctx.origin` into custody and the caller becomes the
    /// loan's funder.
    pub fn approve_loan(&mut self, ctx: &CallContext, id: &LoanId) -> Result<(), EscrowError> {
        self.try_approve(ctx, id)
            .map_err(|e| rejected("approve_loan", ctx, e))
    }

    fn try_approve(&mut self, ctx: &CallContext, id: &LoanId) -> Result<(), EscrowError> {
        let mut record = self.require_status(id, LoanStatus::Created)?;
        if ctx.value != record.amount {
            return Err(EscrowError::InvalidAmount(format!(
                "attached {} but loan {} requires exactly {}",
                ctx.value, id, record.amount
            )));
        }

        self.gateway.receive(&ctx.origin, ctx.value)?;

        record.status = LoanStatus::Approved;
        record.funder = Some(ctx.origin);
        let amount = record.amount;
        self.registry.put(*id, record);
        self.emit(
            ctx,
            LoanEvent::Approved {
                id: *id,
                funder: ctx.origin,
                amount,
            },
        );

        info!(loan_id = %id, funder = %ctx.origin, amount, "loan approved");
        Ok(())
    }

    // -- Settlement --------------------------------------------------------

    /// The receiver accepts an `Approved` loan and is paid the principal.
    pub fn take_loan(&mut self, ctx: &CallContext, id: &LoanId) -> Result<(), EscrowError> {
        self.try_settle(ctx, id, Settlement::Take, None)
            .map_err(|e| rejected("take_loan", ctx, e))
    }

    /// A sponsor takes an `Approved` loan for `receiver`, who signed the
    /// take digest for `id`. Funds still go to the record's receiver.
    pub fn sponsorship_take_loan(
        &mut self,
        ctx: &CallContext,
        id: &LoanId,
        receiver: Address,
        signature: &[u8],
    ) -> Result<(), EscrowError> {
        self.try_settle(ctx, id, Settlement::Take, Some((receiver, signature)))
            .map_err(|e| rejected("sponsorship_take_loan", ctx, e))
    }

    /// The receiver declines an `Approved` loan; the funder is refunded.
    pub fn refuse_loan(&mut self, ctx: &CallContext, id: &LoanId) -> Result<(), EscrowError> {
        self.try_settle(ctx, id, Settlement::Refuse, None)
            .map_err(|e| rejected("refuse_loan", ctx, e))
    }

    /// A sponsor refuses an `Approved` loan for `receiver`, who signed the
    /// refuse digest for `id`. The refund goes to the funder.
    pub fn sponsorship_refuse_loan(
        &mut self,
        ctx: &CallContext,
        id: &LoanId,
        receiver: Address,
        signature: &[u8],
    ) -> Result<(), EscrowError> {
        self.try_settle(ctx, id, Settlement::Refuse, Some((receiver, signature)))
            .map_err(|e| rejected("sponsorship_refuse_loan", ctx, e))
    }

    fn try_settle(
        &mut self,
        ctx: &CallContext,
        id: &LoanId,
        settlement: Settlement,
        delegation: Option<(Address, &[u8])>,
    ) -> Result<(), EscrowError> {
        ensure_no_value(ctx)?;

        let (acting_for, sponsor) = match delegation {
            Some((receiver, signature)) => {
                let action = match settlement {
                    Settlement::Take => DelegatedAction::Take { id: *id },
                    Settlement::Refuse => DelegatedAction::Refuse { id: *id },
                };
                self.verify_delegation(&action, &receiver, signature)?;
                (receiver, Some(ctx.origin))
            }
            None => (ctx.origin, None),
        };

        let mut record = self.require_status(id, LoanStatus::Approved)?;
        if acting_for != record.receiver {
            return Err(EscrowError::Unauthorized {
                caller: acting_for,
                expected: record.receiver,
            });
        }

        let amount = record.amount;
        let (payee, status, event) = match settlement {
            Settlement::Take => (
                record.receiver,
                LoanStatus::Completed,
                LoanEvent::Taken {
                    id: *id,
                    receiver: record.receiver,
                    sponsor,
                    amount,
                },
            ),
            Settlement::Refuse => {
                // An Approved record always has a funder; a store that lost
                // it cannot be refunded.
                let funder = record.funder.ok_or(EscrowError::InvalidState {
                    id: *id,
                    current: record.status,
                    expected: LoanStatus::Approved,
                })?;
                (
                    funder,
                    LoanStatus::Refused,
                    LoanEvent::Refused {
                        id: *id,
                        funder,
                        sponsor,
                        amount,
                    },
                )
            }
        };

        self.gateway.transfer(&payee, amount)?;

        record.status = status;
        self.registry.put(*id, record);
        self.emit(ctx, event);

        info!(
            loan_id = %id,
            status = %status,
            payee = %payee,
            sponsored = sponsor.is_some(),
            amount,
            "loan settled"
        );
        Ok(())
    }

    // -- Cancellation ------------------------------------------------------

    /// Withdraw a `Created` loan. Who may do so depends on
    /// [`EscrowConfig::cancel_policy`].
    pub fn cancel_loan(&mut self, ctx: &CallContext, id: &LoanId) -> Result<(), EscrowError> {
        self.try_cancel(ctx, id)
            .map_err(|e| rejected("cancel_loan", ctx, e))
    }

    fn try_cancel(&mut self, ctx: &CallContext, id: &LoanId) -> Result<(), EscrowError> {
        ensure_no_value(ctx)?;
        let mut record = self.require_status(id, LoanStatus::Created)?;

        if self.config.cancel_policy == CancelPolicy::Administrator
            && ctx.origin != self.config.administrator
        {
            return Err(EscrowError::Unauthorized {
                caller: ctx.origin,
                expected: self.config.administrator,
            });
        }

        record.status = LoanStatus::Canceled;
        self.registry.put(*id, record);
        self.emit(
            ctx,
            LoanEvent::Canceled {
                id: *id,
                by: ctx.origin,
            },
        );

        info!(loan_id = %id, by = %ctx.origin, "loan canceled");
        Ok(())
    }

    // -- Queries -----------------------------------------------------------

    /// The record under `id`; unknown identifiers read as `Empty`.
    pub fn loan(&self, id: &LoanId) -> LoanRecord {
        self.registry.get(id)
    }

    pub fn loans(&self) -> Vec<(LoanId, LoanRecord)> {
        self.registry.records()
    }

    pub fn events(&self) -> &[JournalEntry] {
        &self.events
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    pub fn registry(&self) -> &S {
        &self.registry
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Direct access to the environment behind the gateway (balances, block
    /// height). Moving custody through this handle bypasses the engine and
    /// will show up in [`check_solvency`](Self::check_solvency).
    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    /// Number of requests accepted so far.
    pub fn requests_issued(&self) -> u64 {
        self.ids.nonce()
    }

    /// Custody must equal the sum of principals of `Approved` loans.
    /// Returns that sum when it holds.
    pub fn check_solvency(&self) -> Result<u128, SolvencyError> {
        let approved = self
            .registry
            .records()
            .iter()
            .try_fold(0u128, |total, (_, record)| {
                total.checked_add(record.escrowed())
            })
            .ok_or(SolvencyError::Overflow)?;

        let custody = self.gateway.custody();
        if custody != approved {
            return Err(SolvencyError::Mismatch { custody, approved });
        }
        Ok(approved)
    }

    // -- Internals ---------------------------------------------------------

    fn require_status(&self, id: &LoanId, expected: LoanStatus) -> Result<LoanRecord, EscrowError> {
        let record = self.registry.get(id);
        if record.status != expected {
            return Err(EscrowError::InvalidState {
                id: *id,
                current: record.status,
                expected,
            });
        }
        Ok(record)
    }

    fn verify_delegation(
        &self,
        action: &DelegatedAction,
        receiver: &Address,
        signature: &[u8],
    ) -> Result<(), EscrowError> {
        let recovered = self
            .verifier
            .recover_signed_digest(&action.digest(), signature)?;
        if recovered != *receiver {
            return Err(SignatureFault::SignerMismatch {
                recovered,
                expected: *receiver,
            }
            .into());
        }
        debug!(action = action.name(), receiver = %receiver, "delegation verified");
        Ok(())
    }

    fn emit(&mut self, ctx: &CallContext, event: LoanEvent) {
        let sequence = self.events.len() as u64;
        self.events.push(JournalEntry {
            sequence,
            block_height: ctx.block_height,
            event,
        });
    }
}

fn ensure_no_value(ctx: &CallContext) -> Result<(), EscrowError> {
    if ctx.value != 0 {
        return Err(EscrowError::InvalidAmount(format!(
            "operation takes no value, {} attached",
            ctx.value
        )));
    }
    Ok(())
}

fn validate_terms(ctx: &CallContext, amount: u128, ttl: u64) -> Result<(), EscrowError> {
    if amount == 0 {
        return Err(EscrowError::InvalidAmount(
            "principal must be greater than zero".into(),
        ));
    }
    if ttl <= ctx.block_height {
        return Err(EscrowError::InvalidTtl {
            ttl,
            current_height: ctx.block_height,
        });
    }
    Ok(())
}

fn rejected(operation: &'static str, ctx: &CallContext, err: EscrowError) -> EscrowError {
    debug!(
        operation,
        caller = %ctx.origin,
        kind = %err.kind(),
        error = %err,
        "operation rejected"
    );
    err
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
