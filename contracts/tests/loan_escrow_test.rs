//! Integration tests for the loan escrow.
//!
//! These run the full lifecycle against the ledger-backed gateway and real
//! secp256k1 signatures: direct and sponsored flows, signature replay across
//! actions and loans, transfer failures, and custody accounting.

use lendpact_contracts::authorization::{refuse_digest, request_digest, take_digest};
use lendpact_contracts::{
    CallContext, CancelPolicy, ErrorKind, EscrowConfig, EscrowError, LoanEscrow, LoanEvent,
    LoanId, LoanStatus, SignatureFault,
};
use lendpact_protocol::crypto::LendKeypair;
use lendpact_protocol::identity::Address;
use lendpact_protocol::storage::Ledger;

const FUNDING: u128 = 1_000_000;

struct World {
    escrow: LoanEscrow,
    admin: Address,
    receiver: LendKeypair,
    funder: Address,
    sponsor: Address,
    height: u64,
}

impl World {
    fn new() -> Self {
        Self::with_policy(CancelPolicy::Administrator)
    }

    fn with_policy(policy: CancelPolicy) -> Self {
        let admin = Address::from_bytes([0xad; 20]);
        let funder = Address::from_bytes([0xf0; 20]);
        let sponsor = Address::from_bytes([0x5b; 20]);

        let mut ledger = Ledger::at_height(50);
        ledger.mint(funder, FUNDING).unwrap();

        Self {
            escrow: LoanEscrow::with_ledger(
                EscrowConfig::new(admin).with_cancel_policy(policy),
                ledger,
            ),
            admin,
            receiver: LendKeypair::generate(),
            funder,
            sponsor,
            height: 50,
        }
    }

    fn ctx(&self, origin: Address) -> CallContext {
        CallContext::new(origin, self.height)
    }

    fn borrower(&self) -> Address {
        self.receiver.address()
    }

    fn request(&mut self, amount: u128) -> LoanId {
        let ctx = self.ctx(self.borrower());
        self.escrow.request_loan(&ctx, amount, self.height + 100).unwrap()
    }

    fn approve(&mut self, id: &LoanId, amount: u128) {
        let ctx = self.ctx(self.funder).with_value(amount);
        self.escrow.approve_loan(&ctx, id).unwrap();
    }

    fn assert_solvent(&self) {
        let approved: u128 = self
            .escrow
            .loans()
            .iter()
            .filter(|(_, r)| r.status == LoanStatus::Approved)
            .map(|(_, r)| r.amount)
            .sum();
        assert_eq!(self.escrow.check_solvency(), Ok(approved));
        assert_eq!(self.escrow.gateway().custody(), approved);
    }
}

// ---------------------------------------------------------------------------
// Direct lifecycle
// ---------------------------------------------------------------------------

#[test]
fn request_approve_take() {
    let mut w = World::new();
    let id = w.request(10_000);
    assert_eq!(w.escrow.loan(&id).status, LoanStatus::Created);
    w.assert_solvent();

    w.approve(&id, 10_000);
    assert_eq!(w.escrow.loan(&id).status, LoanStatus::Approved);
    assert_eq!(w.escrow.gateway().balance_of(&w.funder), FUNDING - 10_000);
    w.assert_solvent();

    let ctx = w.ctx(w.borrower());
    w.escrow.take_loan(&ctx, &id).unwrap();
    assert_eq!(w.escrow.loan(&id).status, LoanStatus::Completed);
    assert_eq!(w.escrow.gateway().balance_of(&w.borrower()), 10_000);
    w.assert_solvent();
}

#[test]
fn request_approve_refuse() {
    let mut w = World::new();
    let id = w.request(2_500);
    w.approve(&id, 2_500);

    let ctx = w.ctx(w.borrower());
    w.escrow.refuse_loan(&ctx, &id).unwrap();
    assert_eq!(w.escrow.loan(&id).status, LoanStatus::Refused);
    assert_eq!(w.escrow.gateway().balance_of(&w.funder), FUNDING);
    assert_eq!(w.escrow.gateway().balance_of(&w.borrower()), 0);
    w.assert_solvent();
}

#[test]
fn request_then_cancel() {
    let mut w = World::new();
    let id = w.request(700);

    let ctx = w.ctx(w.admin);
    w.escrow.cancel_loan(&ctx, &id).unwrap();
    assert_eq!(w.escrow.loan(&id).status, LoanStatus::Canceled);

    // A canceled loan can no longer be funded.
    let ctx = w.ctx(w.funder).with_value(700);
    let err = w.escrow.approve_loan(&ctx, &id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(w.escrow.gateway().balance_of(&w.funder), FUNDING);
}

#[test]
fn open_policy_lets_receiver_cancel() {
    let mut w = World::with_policy(CancelPolicy::Open);
    let id = w.request(700);

    let ctx = w.ctx(w.borrower());
    w.escrow.cancel_loan(&ctx, &id).unwrap();
    assert_eq!(w.escrow.loan(&id).status, LoanStatus::Canceled);
}

#[test]
fn loan_ttl_is_advisory() {
    let mut w = World::new();
    let id = w.request(100);
    w.approve(&id, 100);

    let record = w.escrow.loan(&id);
    assert!(!record.is_expired(w.height));
    assert!(record.is_expired(record.ttl + 1));

    // Well past the ttl the receiver can still take.
    w.height = record.ttl + 1_000;
    let ctx = w.ctx(w.borrower());
    w.escrow.take_loan(&ctx, &id).unwrap();
}

// ---------------------------------------------------------------------------
// Sponsored lifecycle
// ---------------------------------------------------------------------------

#[test]
fn sponsored_request_and_take() {
    let mut w = World::new();
    let borrower = w.borrower();
    let ttl = w.height + 10;
    let sig = w.receiver.sign_digest(&request_digest(900, ttl));

    let ctx = w.ctx(w.sponsor);
    let id = w
        .escrow
        .sponsorship_request_loan(&ctx, 900, ttl, borrower, sig.as_bytes())
        .unwrap();
    let record = w.escrow.loan(&id);
    assert_eq!(record.receiver, w.borrower());
    assert_eq!(record.status, LoanStatus::Created);

    w.approve(&id, 900);

    let sig = w.receiver.sign_digest(&take_digest(&id));
    let ctx = w.ctx(w.sponsor);
    w.escrow
        .sponsorship_take_loan(&ctx, &id, borrower, sig.as_bytes())
        .unwrap();

    assert_eq!(w.escrow.loan(&id).status, LoanStatus::Completed);
    assert_eq!(w.escrow.gateway().balance_of(&w.borrower()), 900);
    assert_eq!(w.escrow.gateway().balance_of(&w.sponsor), 0);
    assert!(w.escrow.events().iter().any(|entry| matches!(
        entry.event,
        LoanEvent::Taken { sponsor: Some(s), .. } if s == w.sponsor
    )));
    w.assert_solvent();
}

#[test]
fn sponsored_refuse_refunds_funder() {
    let mut w = World::new();
    let borrower = w.borrower();
    let id = w.request(400);
    w.approve(&id, 400);

    let sig = w.receiver.sign_digest(&refuse_digest(&id));
    let ctx = w.ctx(w.sponsor);
    w.escrow
        .sponsorship_refuse_loan(&ctx, &id, borrower, sig.as_bytes())
        .unwrap();

    assert_eq!(w.escrow.loan(&id).status, LoanStatus::Refused);
    assert_eq!(w.escrow.gateway().balance_of(&w.funder), FUNDING);
    w.assert_solvent();
}

#[test]
fn low_v_signatures_are_accepted() {
    let mut w = World::new();
    let borrower = w.borrower();
    let id = w.request(400);
    w.approve(&id, 400);

    let sig = w.receiver.sign_digest(&take_digest(&id)).with_low_v();
    assert!(sig.as_bytes()[64] < 2);

    let ctx = w.ctx(w.sponsor);
    w.escrow
        .sponsorship_take_loan(&ctx, &id, borrower, sig.as_bytes())
        .unwrap();
    assert_eq!(w.escrow.loan(&id).status, LoanStatus::Completed);
}

#[test]
fn take_signature_cannot_refuse() {
    let mut w = World::new();
    let borrower = w.borrower();
    let id = w.request(400);
    w.approve(&id, 400);

    let take_sig = w.receiver.sign_digest(&take_digest(&id));
    let ctx = w.ctx(w.sponsor);
    let err = w
        .escrow
        .sponsorship_refuse_loan(&ctx, &id, borrower, take_sig.as_bytes())
        .unwrap_err();

    assert!(matches!(
        err,
        EscrowError::InvalidSignature(SignatureFault::SignerMismatch { .. })
    ));
    assert_eq!(w.escrow.loan(&id).status, LoanStatus::Approved);
    w.assert_solvent();
}

#[test]
fn signature_for_another_loan_is_rejected() {
    let mut w = World::new();
    let borrower = w.borrower();
    let first = w.request(400);
    let second = w.request(400);
    w.approve(&first, 400);
    w.approve(&second, 400);

    let sig = w.receiver.sign_digest(&take_digest(&first));
    let ctx = w.ctx(w.sponsor);
    let err = w
        .escrow
        .sponsorship_take_loan(&ctx, &second, borrower, sig.as_bytes())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSignature);
    assert_eq!(w.escrow.loan(&second).status, LoanStatus::Approved);
}

#[test]
fn request_signature_binds_terms() {
    let mut w = World::new();
    let borrower = w.borrower();
    let ttl = w.height + 10;
    let sig = w.receiver.sign_digest(&request_digest(900, ttl));

    let ctx = w.ctx(w.sponsor);
    let err = w
        .escrow
        .sponsorship_request_loan(&ctx, 901, ttl, borrower, sig.as_bytes())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSignature);
    assert!(w.escrow.loans().is_empty());
}

#[test]
fn request_signature_can_be_resubmitted() {
    let mut w = World::new();
    let borrower = w.borrower();
    let ttl = w.height + 10;
    let sig = w.receiver.sign_digest(&request_digest(900, ttl));
    let ctx = w.ctx(w.sponsor);

    let a = w
        .escrow
        .sponsorship_request_loan(&ctx, 900, ttl, borrower, sig.as_bytes())
        .unwrap();
    let b = w
        .escrow
        .sponsorship_request_loan(&ctx, 900, ttl, borrower, sig.as_bytes())
        .unwrap();
    assert_ne!(a, b);
    assert_eq!(w.escrow.loans().len(), 2);
}

#[test]
fn malformed_signature_is_rejected() {
    let mut w = World::new();
    let borrower = w.borrower();
    let id = w.request(400);
    w.approve(&id, 400);

    let mut sig = w.receiver.sign_digest(&take_digest(&id)).as_bytes().to_vec();
    sig[64] = 30;
    let ctx = w.ctx(w.sponsor);
    let err = w
        .escrow
        .sponsorship_take_loan(&ctx, &id, borrower, &sig)
        .unwrap_err();
    assert!(matches!(
        err,
        EscrowError::InvalidSignature(SignatureFault::Malformed(_))
    ));

    let err = w
        .escrow
        .sponsorship_take_loan(&ctx, &id, borrower, &sig[..64])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSignature);
}

#[test]
fn other_signer_for_sponsored_take_is_unauthorized() {
    let mut w = World::new();
    let id = w.request(400);
    w.approve(&id, 400);

    // A valid signature, just not from this loan's receiver.
    let mallory = LendKeypair::generate();
    let sig = mallory.sign_digest(&take_digest(&id));
    let ctx = w.ctx(w.sponsor);
    let err = w
        .escrow
        .sponsorship_take_loan(&ctx, &id, mallory.address(), sig.as_bytes())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(w.escrow.gateway().balance_of(&mallory.address()), 0);
}

// ---------------------------------------------------------------------------
// Failures and accounting
// ---------------------------------------------------------------------------

#[test]
fn frozen_receiver_blocks_take_without_state_change() {
    let mut w = World::new();
    let id = w.request(600);
    w.approve(&id, 600);
    let journal = w.escrow.events().len();

    let borrower = w.borrower();
    w.escrow.gateway_mut().set_frozen(borrower, true);
    let ctx = w.ctx(borrower);
    let err = w.escrow.take_loan(&ctx, &id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransferFailed);
    assert_eq!(w.escrow.loan(&id).status, LoanStatus::Approved);
    assert_eq!(w.escrow.events().len(), journal);
    w.assert_solvent();

    // Refusing still works: the refund goes to the funder.
    w.escrow.refuse_loan(&ctx, &id).unwrap();
    assert_eq!(w.escrow.gateway().balance_of(&w.funder), FUNDING);
    w.assert_solvent();
}

#[test]
fn mixed_sequence_stays_solvent() {
    let mut w = World::new();
    let ids: Vec<LoanId> = (1..=6).map(|i| w.request(i * 1_000)).collect();

    for (i, id) in ids.iter().enumerate().take(5) {
        w.approve(id, (i as u128 + 1) * 1_000);
        w.assert_solvent();
    }

    let receiver_ctx = w.ctx(w.borrower());
    w.escrow.take_loan(&receiver_ctx, &ids[0]).unwrap();
    w.assert_solvent();
    w.escrow.refuse_loan(&receiver_ctx, &ids[1]).unwrap();
    w.assert_solvent();
    let admin_ctx = w.ctx(w.admin);
    w.escrow.cancel_loan(&admin_ctx, &ids[5]).unwrap();
    w.assert_solvent();

    // Rejections do not disturb custody either.
    assert!(w.escrow.take_loan(&receiver_ctx, &ids[0]).is_err());
    assert!(w.escrow.cancel_loan(&admin_ctx, &ids[2]).is_err());
    w.assert_solvent();

    assert_eq!(w.escrow.check_solvency(), Ok(3_000 + 4_000 + 5_000));
    assert_eq!(
        w.escrow.gateway().total_value(),
        FUNDING,
        "value is neither created nor destroyed"
    );
}

#[test]
fn terminal_states_reject_every_operation() {
    let mut w = World::new();
    let borrower = w.borrower();
    let receiver_ctx = w.ctx(borrower);
    let admin_ctx = w.ctx(w.admin);

    let completed = w.request(700);
    w.approve(&completed, 700);
    w.escrow.take_loan(&receiver_ctx, &completed).unwrap();

    let refused = w.request(800);
    w.approve(&refused, 800);
    w.escrow.refuse_loan(&receiver_ctx, &refused).unwrap();

    let canceled = w.request(900);
    w.escrow.cancel_loan(&admin_ctx, &canceled).unwrap();

    // One loan stays open so custody is non-zero throughout.
    let open = w.request(1_100);
    w.approve(&open, 1_100);

    let cases = [
        (completed, LoanStatus::Completed, 700),
        (refused, LoanStatus::Refused, 800),
        (canceled, LoanStatus::Canceled, 900),
    ];

    for (id, status, amount) in cases {
        let custody = w.escrow.gateway().custody();
        let journal = w.escrow.events().len();
        let take_sig = w.receiver.sign_digest(&take_digest(&id));
        let refuse_sig = w.receiver.sign_digest(&refuse_digest(&id));
        let funder_ctx = w.ctx(w.funder).with_value(amount);
        let sponsor_ctx = w.ctx(w.sponsor);

        let attempts = [
            ("approve", w.escrow.approve_loan(&funder_ctx, &id)),
            ("take", w.escrow.take_loan(&receiver_ctx, &id)),
            ("refuse", w.escrow.refuse_loan(&receiver_ctx, &id)),
            ("cancel", w.escrow.cancel_loan(&admin_ctx, &id)),
            (
                "sponsored take",
                w.escrow
                    .sponsorship_take_loan(&sponsor_ctx, &id, borrower, take_sig.as_bytes()),
            ),
            (
                "sponsored refuse",
                w.escrow
                    .sponsorship_refuse_loan(&sponsor_ctx, &id, borrower, refuse_sig.as_bytes()),
            ),
        ];

        for (operation, result) in attempts {
            let err = result.expect_err(operation);
            assert_eq!(
                err.kind(),
                ErrorKind::InvalidState,
                "{operation} on a {status} loan"
            );
        }

        assert_eq!(w.escrow.loan(&id).status, status);
        assert_eq!(w.escrow.gateway().custody(), custody);
        assert_eq!(w.escrow.events().len(), journal);
        w.assert_solvent();
    }

    assert_eq!(w.escrow.check_solvency(), Ok(1_100));
}

#[test]
fn journal_records_every_commit_in_order() {
    let mut w = World::new();
    let id = w.request(50);
    w.approve(&id, 50);
    let ctx = w.ctx(w.borrower());
    w.escrow.take_loan(&ctx, &id).unwrap();
    let _ = w.escrow.take_loan(&ctx, &id);

    let names: Vec<&str> = w.escrow.events().iter().map(|e| e.event.name()).collect();
    assert_eq!(names, ["requested", "approved", "taken"]);
    assert!(w.escrow.events().iter().all(|e| e.block_height == 50));
}
