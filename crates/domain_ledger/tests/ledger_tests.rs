//! Scenario tests for payment submission, confirmation, and reversal
//!
//! These run the full service against the in-memory adapters, exercising
//! the same paths the PostgreSQL adapters back in production.

use std::sync::Arc;

use rust_decimal_macros::dec;

use core_kernel::{Currency, CustomerId, IdempotencyKey, Money, PortError, StoreId};
use domain_billing::{Bill, BillState, BillingError};
use domain_ledger::adapters::{CapturingAlertSink, MemoryLedgerStore, ScriptedGateway};
use domain_ledger::{
    AlertKind, AttemptOutcome, GatewayOutcome, LedgerError, LedgerPolicy, LedgerStore,
    PaymentChannel, PaymentLedger,
};

struct Harness {
    store: Arc<MemoryLedgerStore>,
    gateway: Arc<ScriptedGateway>,
    alerts: Arc<CapturingAlertSink>,
    ledger: Arc<PaymentLedger>,
}

fn harness() -> Harness {
    harness_with_policy(LedgerPolicy::default())
}

fn harness_with_policy(policy: LedgerPolicy) -> Harness {
    let store = Arc::new(MemoryLedgerStore::new());
    let gateway = Arc::new(ScriptedGateway::always_settles());
    let alerts = Arc::new(CapturingAlertSink::new());
    let ledger = Arc::new(PaymentLedger::new(
        store.clone(),
        gateway.clone(),
        alerts.clone(),
        policy,
    ));
    Harness {
        store,
        gateway,
        alerts,
        ledger,
    }
}

fn inr(amount: rust_decimal::Decimal) -> Money {
    Money::new(amount, Currency::Inr)
}

fn key(raw: &str) -> IdempotencyKey {
    IdempotencyKey::new(raw).unwrap()
}

async fn open_bill(h: &Harness, store_id: StoreId, total: Money) -> Bill {
    let bill = h
        .ledger
        .create_bill(store_id, CustomerId::new(), total)
        .await
        .unwrap();
    h.ledger.open_bill(bill.id, bill.version).await.unwrap()
}

#[tokio::test]
async fn full_payment_settles_bill() {
    let h = harness();
    let bill = open_bill(&h, StoreId::new(), inr(dec!(1000.00))).await;

    let receipt = h
        .ledger
        .submit(bill.id, inr(dec!(1000.00)), PaymentChannel::Upi, key("pay-1"))
        .await
        .unwrap();

    assert!(!receipt.duplicate);
    assert_eq!(receipt.attempt.outcome, AttemptOutcome::Settled);

    let bill = h.store.load_bill(bill.id).await.unwrap();
    assert_eq!(bill.state, BillState::Paid);
    assert_eq!(bill.paid_to_date, inr(dec!(1000.00)));
    assert!(h.alerts.published().is_empty());
}

#[tokio::test]
async fn partial_payment_moves_to_partially_paid() {
    let h = harness();
    let bill = open_bill(&h, StoreId::new(), inr(dec!(1000.00))).await;

    h.ledger
        .submit(bill.id, inr(dec!(400.00)), PaymentChannel::Cash, key("pay-1"))
        .await
        .unwrap();

    let bill = h.store.load_bill(bill.id).await.unwrap();
    assert_eq!(bill.state, BillState::PartiallyPaid);
    assert_eq!(bill.balance_due(), inr(dec!(600.00)));
}

#[tokio::test]
async fn duplicate_key_returns_prior_outcome_without_charging_again() {
    let h = harness();
    let bill = open_bill(&h, StoreId::new(), inr(dec!(500.00))).await;

    let first = h
        .ledger
        .submit(bill.id, inr(dec!(500.00)), PaymentChannel::Card, key("pay-1"))
        .await
        .unwrap();

    // Retry with the same key and different parameters still maps to the
    // original attempt.
    let second = h
        .ledger
        .submit(bill.id, inr(dec!(999.00)), PaymentChannel::Cash, key("pay-1"))
        .await
        .unwrap();

    assert!(!first.duplicate);
    assert!(second.duplicate);
    assert_eq!(second.attempt.id, first.attempt.id);
    assert_eq!(second.attempt.amount, inr(dec!(500.00)));

    let bill = h.store.load_bill(bill.id).await.unwrap();
    assert_eq!(bill.paid_to_date, inr(dec!(500.00)));
    assert_eq!(h.store.attempts_for_bill(bill.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_submits_with_same_key_settle_once() {
    let h = harness();
    let bill = open_bill(&h, StoreId::new(), inr(dec!(300.00))).await;

    let a = {
        let ledger = h.ledger.clone();
        let bill_id = bill.id;
        tokio::spawn(async move {
            ledger
                .submit(bill_id, inr(dec!(300.00)), PaymentChannel::Upi, key("race"))
                .await
        })
    };
    let b = {
        let ledger = h.ledger.clone();
        let bill_id = bill.id;
        tokio::spawn(async move {
            ledger
                .submit(bill_id, inr(dec!(300.00)), PaymentChannel::Upi, key("race"))
                .await
        })
    };

    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    assert_eq!(
        [a.duplicate, b.duplicate].iter().filter(|d| **d).count(),
        1,
        "exactly one submission should observe the duplicate"
    );
    assert_eq!(h.store.attempts_for_bill(bill.id).await.unwrap().len(), 1);
    assert_eq!(
        h.store.load_bill(bill.id).await.unwrap().paid_to_date,
        inr(dec!(300.00))
    );
}

#[tokio::test]
async fn declined_charge_leaves_bill_untouched() {
    let h = harness();
    let bill = open_bill(&h, StoreId::new(), inr(dec!(100.00))).await;
    h.gateway
        .push(Ok(GatewayOutcome::Failed("insufficient funds".into())));

    let receipt = h
        .ledger
        .submit(bill.id, inr(dec!(100.00)), PaymentChannel::Wallet, key("pay-1"))
        .await
        .unwrap();

    assert_eq!(receipt.attempt.outcome, AttemptOutcome::Failed);
    assert_eq!(receipt.attempt.note.as_deref(), Some("insufficient funds"));

    let bill = h.store.load_bill(bill.id).await.unwrap();
    assert_eq!(bill.state, BillState::Open);
    assert!(bill.paid_to_date.is_zero());
}

#[tokio::test]
async fn deferred_charge_stays_pending_until_confirmed() {
    let h = harness();
    let bill = open_bill(&h, StoreId::new(), inr(dec!(800.00))).await;
    h.gateway.push(Ok(GatewayOutcome::Pending));

    let receipt = h
        .ledger
        .submit(bill.id, inr(dec!(800.00)), PaymentChannel::Upi, key("pay-1"))
        .await
        .unwrap();
    assert_eq!(receipt.attempt.outcome, AttemptOutcome::Pending);
    assert!(h.store.load_bill(bill.id).await.unwrap().paid_to_date.is_zero());

    let confirmed = h
        .ledger
        .confirm(receipt.attempt.id, GatewayOutcome::Settled)
        .await
        .unwrap();
    assert!(!confirmed.duplicate);
    assert_eq!(confirmed.attempt.outcome, AttemptOutcome::Settled);
    assert_eq!(
        h.store.load_bill(bill.id).await.unwrap().state,
        BillState::Paid
    );

    // A repeated matching confirmation is a no-op.
    let again = h
        .ledger
        .confirm(receipt.attempt.id, GatewayOutcome::Settled)
        .await
        .unwrap();
    assert!(again.duplicate);

    // A conflicting confirmation is rejected and changes nothing.
    let conflict = h
        .ledger
        .confirm(receipt.attempt.id, GatewayOutcome::Failed("late decline".into()))
        .await;
    assert!(matches!(conflict, Err(LedgerError::OutcomeConflict { .. })));
    assert_eq!(
        h.store.load_bill(bill.id).await.unwrap().paid_to_date,
        inr(dec!(800.00))
    );
}

#[tokio::test]
async fn slow_gateway_times_out_and_leaves_attempt_pending() {
    let mut policy = LedgerPolicy::default();
    policy.gateway_timeout_ms = 50;
    let h = harness_with_policy(policy);
    let bill = open_bill(&h, StoreId::new(), inr(dec!(100.00))).await;
    h.gateway.push_delayed(
        Ok(GatewayOutcome::Settled),
        Some(std::time::Duration::from_millis(500)),
    );

    let result = h
        .ledger
        .submit(bill.id, inr(dec!(100.00)), PaymentChannel::Card, key("slow"))
        .await;
    assert!(matches!(result, Err(LedgerError::GatewayTimeout { .. })));

    let attempts = h.store.attempts_for_bill(bill.id).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].outcome, AttemptOutcome::Pending);
    assert!(h.store.load_bill(bill.id).await.unwrap().paid_to_date.is_zero());
}

#[tokio::test]
async fn unreachable_gateway_leaves_attempt_pending_without_error() {
    let h = harness();
    let bill = open_bill(&h, StoreId::new(), inr(dec!(100.00))).await;
    h.gateway.push(Err(PortError::connection("gateway down")));

    let receipt = h
        .ledger
        .submit(bill.id, inr(dec!(100.00)), PaymentChannel::Upi, key("down"))
        .await
        .unwrap();
    assert_eq!(receipt.attempt.outcome, AttemptOutcome::Pending);
}

#[tokio::test]
async fn overpayment_records_money_alerts_once_and_blocks_paid() {
    let h = harness();
    let bill = open_bill(&h, StoreId::new(), inr(dec!(1000.00))).await;

    let result = h
        .ledger
        .submit(bill.id, inr(dec!(1200.00)), PaymentChannel::Card, key("over"))
        .await;
    assert!(matches!(
        result,
        Err(LedgerError::Billing(BillingError::OverpaymentExceeded { .. }))
    ));

    let stored = h.store.load_bill(bill.id).await.unwrap();
    assert_eq!(stored.state, BillState::Open, "state must not advance");
    assert_eq!(stored.paid_to_date, inr(dec!(1200.00)), "money is recorded");
    assert!(stored.overpayment_alerted);

    let alerts = h.alerts.published();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::Overpayment);

    // Restating again with an unchanged ledger raises nothing new.
    let again = h.ledger.restate(bill.id).await;
    assert!(matches!(
        again,
        Err(LedgerError::Billing(BillingError::OverpaymentExceeded { .. }))
    ));
    assert_eq!(h.alerts.published().len(), 1);
}

#[tokio::test]
async fn high_value_bill_alerts_exactly_once() {
    let h = harness();
    let bill = open_bill(&h, StoreId::new(), inr(dec!(15000.00))).await;

    h.ledger
        .submit(bill.id, inr(dec!(9000.00)), PaymentChannel::Upi, key("p1"))
        .await
        .unwrap();
    assert!(h.alerts.published().is_empty(), "below threshold, no alert");

    h.ledger
        .submit(bill.id, inr(dec!(3000.00)), PaymentChannel::Upi, key("p2"))
        .await
        .unwrap();
    let alerts = h.alerts.published();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::HighValue);

    h.ledger
        .submit(bill.id, inr(dec!(3000.00)), PaymentChannel::Upi, key("p3"))
        .await
        .unwrap();
    assert_eq!(h.alerts.published().len(), 1, "marker suppresses a re-alert");
}

#[tokio::test]
async fn single_large_attempt_triggers_high_value() {
    let h = harness();
    let bill = open_bill(&h, StoreId::new(), inr(dec!(20000.00))).await;

    h.ledger
        .submit(bill.id, inr(dec!(10000.00)), PaymentChannel::Card, key("big"))
        .await
        .unwrap();

    let alerts = h.alerts.published();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::HighValue);
}

#[tokio::test]
async fn reversal_restates_bill_and_is_idempotent() {
    let h = harness();
    let bill = open_bill(&h, StoreId::new(), inr(dec!(1000.00))).await;

    let receipt = h
        .ledger
        .submit(bill.id, inr(dec!(1000.00)), PaymentChannel::Upi, key("pay"))
        .await
        .unwrap();
    assert_eq!(
        h.store.load_bill(bill.id).await.unwrap().state,
        BillState::Paid
    );

    let reversal = h
        .ledger
        .reverse(receipt.attempt.id, "customer dispute")
        .await
        .unwrap();
    assert!(!reversal.duplicate);
    assert_eq!(reversal.attempt.outcome, AttemptOutcome::Reversed);

    let restated = h.store.load_bill(bill.id).await.unwrap();
    assert_eq!(restated.state, BillState::Open);
    assert!(restated.paid_to_date.is_zero());

    // The original record is untouched.
    let original = h.store.load_attempt(receipt.attempt.id).await.unwrap();
    assert_eq!(original.outcome, AttemptOutcome::Settled);

    let again = h
        .ledger
        .reverse(receipt.attempt.id, "customer dispute")
        .await
        .unwrap();
    assert!(again.duplicate);
    assert_eq!(again.attempt.id, reversal.attempt.id);
    assert_eq!(h.store.attempts_for_bill(bill.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn only_settled_charges_are_reversible() {
    let h = harness();
    let bill = open_bill(&h, StoreId::new(), inr(dec!(100.00))).await;
    h.gateway.push(Ok(GatewayOutcome::Pending));

    let receipt = h
        .ledger
        .submit(bill.id, inr(dec!(100.00)), PaymentChannel::Upi, key("pend"))
        .await
        .unwrap();

    let result = h.ledger.reverse(receipt.attempt.id, "too soon").await;
    assert!(matches!(result, Err(LedgerError::NotReversible { .. })));
}

#[tokio::test]
async fn draft_and_voided_bills_reject_payments() {
    let h = harness();
    let store_id = StoreId::new();

    let draft = h
        .ledger
        .create_bill(store_id, CustomerId::new(), inr(dec!(100.00)))
        .await
        .unwrap();
    let result = h
        .ledger
        .submit(draft.id, inr(dec!(100.00)), PaymentChannel::Cash, key("d"))
        .await;
    assert!(matches!(
        result,
        Err(LedgerError::Billing(BillingError::InvalidTransition { .. }))
    ));

    let opened = h.ledger.open_bill(draft.id, draft.version).await.unwrap();
    let voided = h
        .ledger
        .void_bill(opened.id, opened.version, "duplicate order")
        .await
        .unwrap();
    assert!(matches!(voided.state, BillState::Voided { .. }));

    let result = h
        .ledger
        .submit(voided.id, inr(dec!(100.00)), PaymentChannel::Cash, key("v"))
        .await;
    assert!(matches!(
        result,
        Err(LedgerError::Billing(BillingError::InvalidTransition { .. }))
    ));
}

#[tokio::test]
async fn void_requires_fresh_version_and_zero_payments() {
    let h = harness();
    let bill = open_bill(&h, StoreId::new(), inr(dec!(500.00))).await;

    let stale = h.ledger.void_bill(bill.id, bill.version - 1, "stale").await;
    assert!(matches!(
        stale,
        Err(LedgerError::Billing(BillingError::ConcurrentModification { .. }))
    ));

    h.ledger
        .submit(bill.id, inr(dec!(200.00)), PaymentChannel::Cash, key("p"))
        .await
        .unwrap();
    let current = h.store.load_bill(bill.id).await.unwrap();
    let paid = h.ledger.void_bill(bill.id, current.version, "nope").await;
    assert!(matches!(
        paid,
        Err(LedgerError::Billing(BillingError::VoidNotAllowed(_)))
    ));
}

#[tokio::test]
async fn store_summary_aggregates_persisted_state() {
    let h = harness();
    let store_id = StoreId::new();

    // Paid in full.
    let a = open_bill(&h, store_id, inr(dec!(1000.00))).await;
    h.ledger
        .submit(a.id, inr(dec!(1000.00)), PaymentChannel::Upi, key("a"))
        .await
        .unwrap();

    // Half paid.
    let b = open_bill(&h, store_id, inr(dec!(600.00))).await;
    h.ledger
        .submit(b.id, inr(dec!(300.00)), PaymentChannel::Cash, key("b"))
        .await
        .unwrap();

    // Untouched.
    open_bill(&h, store_id, inr(dec!(250.00))).await;

    // A different store's bill stays invisible.
    open_bill(&h, StoreId::new(), inr(dec!(9999.00))).await;

    let summary = h.ledger.store_summary(store_id).await.unwrap();
    assert_eq!(summary.bill_count, 3);
    assert_eq!(summary.paid_total, inr(dec!(1300.00)));
    assert_eq!(summary.open_balance, inr(dec!(550.00)));
    assert_eq!(summary.alert_count, 0);
}

#[tokio::test]
async fn partial_resubmission_with_same_key_records_once() {
    let h = harness();
    let bill = open_bill(&h, StoreId::new(), inr(dec!(1000.00))).await;

    let first = h
        .ledger
        .submit(bill.id, inr(dec!(600.00)), PaymentChannel::Upi, key("pay-1"))
        .await
        .unwrap();
    let second = h
        .ledger
        .submit(bill.id, inr(dec!(600.00)), PaymentChannel::Upi, key("pay-1"))
        .await
        .unwrap();

    assert!(!first.duplicate);
    assert!(second.duplicate);
    assert_eq!(second.attempt.id, first.attempt.id);
    assert_eq!(second.attempt.outcome, AttemptOutcome::Settled);

    let bill = h.store.load_bill(bill.id).await.unwrap();
    assert_eq!(bill.state, BillState::PartiallyPaid);
    assert_eq!(bill.paid_to_date, inr(dec!(600.00)));
    assert_eq!(h.store.attempts_for_bill(bill.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn resubmitted_key_is_honored_after_bill_is_paid() {
    let h = harness();
    let bill = open_bill(&h, StoreId::new(), inr(dec!(1000.00))).await;

    let first = h
        .ledger
        .submit(bill.id, inr(dec!(1000.00)), PaymentChannel::Card, key("pay-1"))
        .await
        .unwrap();
    assert_eq!(
        h.store.load_bill(bill.id).await.unwrap().state,
        BillState::Paid
    );

    // The retry of the very submission that paid the bill off observes the
    // recorded outcome, not a state rejection.
    let retry = h
        .ledger
        .submit(bill.id, inr(dec!(1000.00)), PaymentChannel::Card, key("pay-1"))
        .await
        .unwrap();
    assert!(retry.duplicate);
    assert_eq!(retry.attempt.id, first.attempt.id);
    assert_eq!(retry.attempt.outcome, AttemptOutcome::Settled);
    assert_eq!(h.store.attempts_for_bill(bill.id).await.unwrap().len(), 1);

    // A genuinely new key against the paid bill is still rejected.
    let fresh = h
        .ledger
        .submit(bill.id, inr(dec!(100.00)), PaymentChannel::Card, key("pay-2"))
        .await;
    assert!(matches!(
        fresh,
        Err(LedgerError::Billing(BillingError::InvalidTransition { .. }))
    ));
}

#[tokio::test]
async fn void_rejected_while_attempt_pending() {
    let h = harness();
    let bill = open_bill(&h, StoreId::new(), inr(dec!(300.00))).await;
    h.gateway.push(Ok(GatewayOutcome::Pending));

    let receipt = h
        .ledger
        .submit(bill.id, inr(dec!(300.00)), PaymentChannel::Card, key("pay-1"))
        .await
        .unwrap();
    assert_eq!(receipt.attempt.outcome, AttemptOutcome::Pending);

    let current = h.store.load_bill(bill.id).await.unwrap();
    let blocked = h
        .ledger
        .void_bill(bill.id, current.version, "customer left")
        .await;
    assert!(matches!(
        blocked,
        Err(LedgerError::Billing(BillingError::VoidNotAllowed(_)))
    ));

    // Once the attempt resolves, the void goes through.
    h.ledger
        .confirm(receipt.attempt.id, GatewayOutcome::Failed("declined".into()))
        .await
        .unwrap();
    let current = h.store.load_bill(bill.id).await.unwrap();
    let voided = h
        .ledger
        .void_bill(bill.id, current.version, "customer left")
        .await
        .unwrap();
    assert!(matches!(voided.state, BillState::Voided { .. }));
}
