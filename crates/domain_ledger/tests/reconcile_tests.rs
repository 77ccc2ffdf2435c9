//! Scenario tests for the reconciliation engine and sweep

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

use core_kernel::{Currency, CustomerId, IdempotencyKey, Money, StoreId};
use domain_billing::{Bill, BillState};
use domain_ledger::adapters::{CapturingAlertSink, MemoryLedgerStore, ScriptedGateway};
use domain_ledger::{
    AlertKind, AttemptOutcome, GatewayOutcome, LedgerPolicy, LedgerStore, PaymentAttempt,
    PaymentChannel, PaymentLedger, ReconciliationEngine,
};

struct Harness {
    store: Arc<MemoryLedgerStore>,
    gateway: Arc<ScriptedGateway>,
    alerts: Arc<CapturingAlertSink>,
    ledger: PaymentLedger,
    engine: ReconciliationEngine,
}

fn harness() -> Harness {
    let policy = LedgerPolicy::default();
    let store = Arc::new(MemoryLedgerStore::new());
    let gateway = Arc::new(ScriptedGateway::always_settles());
    let alerts = Arc::new(CapturingAlertSink::new());
    let ledger = PaymentLedger::new(
        store.clone(),
        gateway.clone(),
        alerts.clone(),
        policy.clone(),
    );
    let engine = ReconciliationEngine::new(store.clone(), alerts.clone(), policy);
    Harness {
        store,
        gateway,
        alerts,
        ledger,
        engine,
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
async fn consistent_bill_produces_no_write_and_no_alert() {
    let h = harness();
    let bill = open_bill(&h, StoreId::new(), inr(dec!(1000.00))).await;
    h.ledger
        .submit(bill.id, inr(dec!(400.00)), PaymentChannel::Upi, key("p"))
        .await
        .unwrap();
    let version_before = h.store.load_bill(bill.id).await.unwrap().version;

    let outcome = h.engine.reconcile_bill(bill.id).await.unwrap();

    assert!(!outcome.corrected);
    assert!(!outcome.overpaid);
    assert_eq!(
        h.store.load_bill(bill.id).await.unwrap().version,
        version_before
    );
    assert!(h.alerts.published().is_empty());
}

#[tokio::test]
async fn drifted_bill_is_corrected_with_discrepancy_alert() {
    let h = harness();
    let bill = open_bill(&h, StoreId::new(), inr(dec!(1000.00))).await;
    h.gateway.push(Ok(GatewayOutcome::Pending));
    let receipt = h
        .ledger
        .submit(bill.id, inr(dec!(1000.00)), PaymentChannel::Upi, key("p"))
        .await
        .unwrap();

    // Simulate a crash between finalizing the attempt and restating the
    // bill: the attempt settles but the bill never hears about it.
    let mut attempt = receipt.attempt;
    attempt.mark_settled().unwrap();
    h.store.finalize_attempt(&attempt).await.unwrap();

    let outcome = h.engine.reconcile_bill(bill.id).await.unwrap();
    assert!(outcome.corrected);

    let corrected = h.store.load_bill(bill.id).await.unwrap();
    assert_eq!(corrected.state, BillState::Paid);
    assert_eq!(corrected.paid_to_date, inr(dec!(1000.00)));

    let alerts = h.alerts.published();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::Discrepancy);

    // Idempotent: a second run finds nothing to correct.
    let outcome = h.engine.reconcile_bill(bill.id).await.unwrap();
    assert!(!outcome.corrected);
    assert_eq!(h.alerts.published().len(), 1);
}

#[tokio::test]
async fn overpaid_bill_reconciles_without_duplicate_alerts() {
    let h = harness();
    let bill = open_bill(&h, StoreId::new(), inr(dec!(1000.00))).await;
    let _ = h
        .ledger
        .submit(bill.id, inr(dec!(1200.00)), PaymentChannel::Card, key("over"))
        .await;
    assert_eq!(h.alerts.published().len(), 1);

    let outcome = h.engine.reconcile_bill(bill.id).await.unwrap();

    assert!(outcome.overpaid);
    assert!(!outcome.corrected);
    assert_eq!(h.alerts.published().len(), 1, "marker suppresses a re-alert");
    assert_eq!(
        h.store.load_bill(bill.id).await.unwrap().state,
        BillState::Open
    );
}

#[tokio::test]
async fn draft_and_voided_bills_are_skipped() {
    let h = harness();
    let store_id = StoreId::new();
    let draft = h
        .ledger
        .create_bill(store_id, CustomerId::new(), inr(dec!(100.00)))
        .await
        .unwrap();

    let outcome = h.engine.reconcile_bill(draft.id).await.unwrap();
    assert!(!outcome.corrected);
    assert!(h.alerts.published().is_empty());
}

#[tokio::test]
async fn sweep_times_out_abandoned_pending_attempts() {
    let h = harness();
    let store_id = StoreId::new();
    let bill = open_bill(&h, store_id, inr(dec!(500.00))).await;

    // An attempt stuck pending for over an hour, inserted as the crash
    // left it.
    let mut stale = PaymentAttempt::charge(
        bill.id,
        store_id,
        inr(dec!(500.00)),
        PaymentChannel::Upi,
        key("stuck"),
    )
    .unwrap();
    stale.created_at = Utc::now() - Duration::hours(1);
    h.store.insert_attempt(&stale).await.unwrap();

    let report = h.engine.sweep(store_id, Utc::now() - Duration::days(1)).await.unwrap();

    assert_eq!(report.attempts_timed_out, 1);
    let attempts = h.store.attempts_for_bill(bill.id).await.unwrap();
    assert_eq!(attempts[0].outcome, AttemptOutcome::Failed);
    assert!(h.store.load_bill(bill.id).await.unwrap().paid_to_date.is_zero());

    // Running again changes nothing more.
    let report = h.engine.sweep(store_id, Utc::now() - Duration::days(1)).await.unwrap();
    assert_eq!(report.attempts_timed_out, 0);
    assert_eq!(report.bills_corrected, 0);
}

#[tokio::test]
async fn sweep_is_idempotent_over_an_unchanged_ledger() {
    let h = harness();
    let store_id = StoreId::new();
    let bill = open_bill(&h, store_id, inr(dec!(1000.00))).await;
    h.ledger
        .submit(bill.id, inr(dec!(1000.00)), PaymentChannel::Upi, key("p"))
        .await
        .unwrap();

    let epoch = Utc::now() - Duration::days(1);
    let first = h.engine.sweep(store_id, epoch).await.unwrap();
    assert_eq!(first.bills_examined, 1);
    assert_eq!(first.bills_corrected, 0);

    let second = h.engine.sweep(store_id, epoch).await.unwrap();
    assert_eq!(second.bills_corrected, 0);
    assert!(h.alerts.published().is_empty());

    // The high-water mark advances the checkpoint past settled work.
    let third = h.engine.sweep(store_id, first.high_water_mark).await.unwrap();
    assert_eq!(third.bills_examined, 0);
}

#[tokio::test]
async fn sweep_restates_bills_touched_by_timed_out_attempts() {
    let h = harness();
    let store_id = StoreId::new();
    let bill = open_bill(&h, store_id, inr(dec!(400.00))).await;

    // A pending attempt old enough to time out, plus a settled one the
    // bill has not absorbed yet.
    let mut stale = PaymentAttempt::charge(
        bill.id,
        store_id,
        inr(dec!(400.00)),
        PaymentChannel::Cash,
        key("stale"),
    )
    .unwrap();
    stale.created_at = Utc::now() - Duration::hours(2);
    h.store.insert_attempt(&stale).await.unwrap();

    let mut settled = PaymentAttempt::charge(
        bill.id,
        store_id,
        inr(dec!(400.00)),
        PaymentChannel::Upi,
        key("done"),
    )
    .unwrap();
    settled.mark_settled().unwrap();
    h.store.insert_attempt(&settled).await.unwrap();

    let report = h.engine.sweep(store_id, Utc::now() - Duration::days(1)).await.unwrap();

    assert_eq!(report.attempts_timed_out, 1);
    assert_eq!(report.bills_corrected, 1);
    let bill = h.store.load_bill(bill.id).await.unwrap();
    assert_eq!(bill.state, BillState::Paid);
    assert_eq!(bill.paid_to_date, inr(dec!(400.00)));
}

#[tokio::test]
async fn settled_money_on_voided_bill_raises_discrepancy() {
    let h = harness();
    let store_id = StoreId::new();
    let bill = open_bill(&h, store_id, inr(dec!(500.00))).await;
    let voided = h
        .ledger
        .void_bill(bill.id, bill.version, "order cancelled")
        .await
        .unwrap();

    // A confirmation that raced the void: the attempt settles in storage
    // after the bill has already closed.
    let mut stray = PaymentAttempt::charge(
        bill.id,
        store_id,
        inr(dec!(500.00)),
        PaymentChannel::Card,
        key("raced"),
    )
    .unwrap();
    h.store.insert_attempt(&stray).await.unwrap();
    stray.mark_settled().unwrap();
    h.store.finalize_attempt(&stray).await.unwrap();

    let outcome = h.engine.reconcile_bill(bill.id).await.unwrap();
    assert!(!outcome.corrected);

    let alerts = h.alerts.published();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::Discrepancy);
    assert!(alerts[0].details.contains("voided bill"));

    // The bill never restates, and the alert stands on every pass until
    // the stray money is dealt with.
    let after = h.store.load_bill(bill.id).await.unwrap();
    assert_eq!(after.version, voided.version);
    assert!(matches!(after.state, BillState::Voided { .. }));

    h.engine.reconcile_bill(bill.id).await.unwrap();
    assert_eq!(h.alerts.published().len(), 2);
}
