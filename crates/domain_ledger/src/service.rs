//! Payment ledger service
//!
//! `PaymentLedger` is the single entry point for money-affecting writes:
//! bill lifecycle, payment submission, late gateway confirmations, and
//! reversals. Every path follows the same shape: append to the attempt
//! ledger first, then restate the bill from the ledger as a whole.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use core_kernel::{
    BillId, CustomerId, IdempotencyKey, Money, PaymentAttemptId, PortError, StoreId,
};
use domain_billing::{Bill, BillEvent, BillingError};

use crate::alerts::{AlertEvent, AlertKind, AlertSink};
use crate::attempt::{AttemptOutcome, PaymentAttempt, PaymentChannel};
use crate::config::LedgerPolicy;
use crate::error::LedgerError;
use crate::gateway::{GatewayOutcome, PaymentGateway};
use crate::store::{AttemptInsert, LedgerStore};

/// Bounded retries for the read-modify-CAS loop on a bill
const CAS_RETRIES: u32 = 5;

/// What a submission (or confirmation) handed back to the caller
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    /// The attempt record as persisted, including its current outcome
    pub attempt: PaymentAttempt,
    /// True when the idempotency key matched an earlier submission and the
    /// prior record was returned instead of charging again
    pub duplicate: bool,
}

/// Orchestrates bills, the attempt ledger, the gateway, and alerts
pub struct PaymentLedger {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    alerts: Arc<dyn AlertSink>,
    policy: LedgerPolicy,
}

impl PaymentLedger {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        alerts: Arc<dyn AlertSink>,
        policy: LedgerPolicy,
    ) -> Self {
        Self {
            store,
            gateway,
            alerts,
            policy,
        }
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    pub(crate) fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Creates a bill in `Draft` and persists it
    #[instrument(skip(self), fields(%store_id, %customer_id))]
    pub async fn create_bill(
        &self,
        store_id: StoreId,
        customer_id: CustomerId,
        total: Money,
    ) -> Result<Bill, LedgerError> {
        if total.currency() != self.policy.currency {
            return Err(LedgerError::InvalidAmount(format!(
                "bill currency {} does not match ledger currency {}",
                total.currency(),
                self.policy.currency
            )));
        }

        let mut bill = Bill::create(store_id, customer_id, total)?;
        self.store.insert_bill(&bill).await?;
        for event in bill.take_events() {
            debug!(?event, "bill event");
        }
        info!(bill_id = %bill.id, %total, "bill created");
        Ok(bill)
    }

    /// Opens a draft bill for payment
    #[instrument(skip(self), fields(%bill_id))]
    pub async fn open_bill(
        &self,
        bill_id: BillId,
        expected_version: u32,
    ) -> Result<Bill, LedgerError> {
        let mut bill = self.store.load_bill(bill_id).await?;
        bill.require_version(expected_version)?;
        bill.open()?;
        self.store.update_bill(&bill, expected_version).await?;
        for event in bill.take_events() {
            debug!(?event, "bill event");
        }
        Ok(bill)
    }

    /// Voids a bill that has collected no money
    ///
    /// A bill with a pending attempt cannot be voided: the attempt could
    /// still settle through a late confirmation, and settled money on a
    /// voided bill is unaccountable. Callers wait for the attempt to
    /// resolve (or for the sweep to time it out) and retry.
    #[instrument(skip(self), fields(%bill_id))]
    pub async fn void_bill(
        &self,
        bill_id: BillId,
        expected_version: u32,
        reason: impl Into<String> + std::fmt::Debug,
    ) -> Result<Bill, LedgerError> {
        let mut bill = self.store.load_bill(bill_id).await?;
        bill.require_version(expected_version)?;
        let attempts = self.store.attempts_for_bill(bill_id).await?;
        if let Some(pending) = attempts.iter().find(|a| a.is_pending()) {
            return Err(LedgerError::Billing(BillingError::VoidNotAllowed(format!(
                "attempt {} is still pending",
                pending.id
            ))));
        }
        bill.void(reason)?;
        self.store.update_bill(&bill, expected_version).await?;
        for event in bill.take_events() {
            debug!(?event, "bill event");
        }
        Ok(bill)
    }

    /// Submits a payment attempt against a bill
    ///
    /// The attempt is persisted as pending before the gateway is called, so
    /// a crash mid-call leaves a record the sweep can resolve. Duplicate
    /// idempotency keys return the prior record's outcome instead of
    /// charging again, regardless of the parameters on the retry and even
    /// when the first submission has since paid the bill off.
    ///
    /// # Errors
    ///
    /// - `InvalidTransition` when the bill cannot accept payments
    /// - `GatewayTimeout` when the gateway does not answer inside the
    ///   policy budget; the attempt stays pending for the sweep
    /// - `OverpaymentExceeded` (via `Billing`) when the settled attempt
    ///   pushed the bill beyond tolerance; the money is recorded and the
    ///   alert has fired by the time this returns
    #[instrument(skip(self, idempotency_key), fields(%bill_id, %amount, %channel))]
    pub async fn submit(
        &self,
        bill_id: BillId,
        amount: Money,
        channel: PaymentChannel,
        idempotency_key: IdempotencyKey,
    ) -> Result<SubmitReceipt, LedgerError> {
        let bill = self.store.load_bill(bill_id).await?;

        // The key index is consulted before any bill-state check: a retry
        // of the submission that paid the bill off must still observe the
        // recorded outcome, not a state rejection. An attempt is always
        // inserted before its bill can settle, so a bill seen as paid here
        // implies the paying key is already visible.
        if let Some(existing) = self
            .store
            .attempt_by_key(bill.store_id, &idempotency_key)
            .await?
        {
            debug!(attempt_id = %existing.id, "idempotency key hit, returning prior outcome");
            return Ok(SubmitReceipt {
                attempt: existing,
                duplicate: true,
            });
        }

        if !bill.is_payable() {
            return Err(LedgerError::Billing(BillingError::InvalidTransition {
                from: bill.state.name().to_string(),
                to: "PartiallyPaid".to_string(),
            }));
        }
        if amount.currency() != bill.currency() {
            return Err(LedgerError::InvalidAmount(format!(
                "payment currency {} does not match bill currency {}",
                amount.currency(),
                bill.currency()
            )));
        }

        let mut attempt =
            PaymentAttempt::charge(bill_id, bill.store_id, amount, channel, idempotency_key)?;

        match self.store.insert_attempt(&attempt).await? {
            AttemptInsert::Inserted => {}
            AttemptInsert::Duplicate(existing) => {
                debug!(attempt_id = %existing.id, "idempotency key hit, returning prior outcome");
                return Ok(SubmitReceipt {
                    attempt: existing,
                    duplicate: true,
                });
            }
        }

        let charge = self
            .gateway
            .attempt_charge(attempt.amount, attempt.channel, attempt.id);
        let outcome = match tokio::time::timeout(self.policy.gateway_timeout(), charge).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                warn!(attempt_id = %attempt.id, %err, "gateway unreachable, attempt left pending");
                return Ok(SubmitReceipt {
                    attempt,
                    duplicate: false,
                });
            }
            Err(_) => {
                warn!(attempt_id = %attempt.id, "gateway timed out, attempt left pending");
                return Err(LedgerError::GatewayTimeout {
                    attempt_id: attempt.id,
                    timeout_ms: self.policy.gateway_timeout_ms,
                });
            }
        };

        match outcome {
            GatewayOutcome::Settled => {
                attempt.mark_settled()?;
                self.store.finalize_attempt(&attempt).await?;
                restate_bill(&self.store, &self.alerts, &self.policy, bill_id).await?;
            }
            GatewayOutcome::Failed(reason) => {
                info!(attempt_id = %attempt.id, %reason, "gateway declined charge");
                attempt.mark_failed(reason)?;
                self.store.finalize_attempt(&attempt).await?;
            }
            GatewayOutcome::Pending => {
                debug!(attempt_id = %attempt.id, "gateway deferred, attempt stays pending");
            }
        }

        Ok(SubmitReceipt {
            attempt,
            duplicate: false,
        })
    }

    /// Applies a late gateway outcome to a pending attempt
    ///
    /// Channel webhooks and manual operator confirmation land here. A
    /// confirmation that matches the recorded final outcome is a no-op; a
    /// conflicting one fails with `OutcomeConflict` and touches nothing.
    #[instrument(skip(self), fields(%attempt_id))]
    pub async fn confirm(
        &self,
        attempt_id: PaymentAttemptId,
        outcome: GatewayOutcome,
    ) -> Result<SubmitReceipt, LedgerError> {
        let mut attempt = self.store.load_attempt(attempt_id).await?;

        if attempt.outcome.is_final() {
            let matches = match (&outcome, attempt.outcome) {
                (GatewayOutcome::Settled, AttemptOutcome::Settled) => true,
                (GatewayOutcome::Failed(_), AttemptOutcome::Failed) => true,
                _ => false,
            };
            if matches {
                return Ok(SubmitReceipt {
                    attempt,
                    duplicate: true,
                });
            }
            return Err(LedgerError::OutcomeConflict {
                attempt_id,
                recorded: attempt.outcome,
                reported: match outcome {
                    GatewayOutcome::Settled => AttemptOutcome::Settled,
                    GatewayOutcome::Failed(_) => AttemptOutcome::Failed,
                    GatewayOutcome::Pending => AttemptOutcome::Pending,
                },
            });
        }

        match outcome {
            GatewayOutcome::Settled => {
                attempt.mark_settled()?;
                self.store.finalize_attempt(&attempt).await?;
                restate_bill(&self.store, &self.alerts, &self.policy, attempt.bill_id).await?;
            }
            GatewayOutcome::Failed(reason) => {
                attempt.mark_failed(reason)?;
                self.store.finalize_attempt(&attempt).await?;
            }
            GatewayOutcome::Pending => {
                // Nothing to apply; the attempt is already pending.
            }
        }

        Ok(SubmitReceipt {
            attempt,
            duplicate: false,
        })
    }

    /// Reverses a settled charge by appending an offsetting record
    ///
    /// The original attempt is untouched; the reversal contributes
    /// negatively to the settled total and the bill restates itself, which
    /// may move it back from `Paid`. Reversing the same attempt twice is
    /// idempotent.
    #[instrument(skip(self), fields(%attempt_id))]
    pub async fn reverse(
        &self,
        attempt_id: PaymentAttemptId,
        reason: impl Into<String> + std::fmt::Debug,
    ) -> Result<SubmitReceipt, LedgerError> {
        let original = self.store.load_attempt(attempt_id).await?;
        if !original.is_settled_charge() {
            return Err(LedgerError::NotReversible {
                attempt_id,
                detail: format!(
                    "only settled charges can be reversed, found {} {}",
                    match original.kind {
                        crate::attempt::AttemptKind::Charge => "charge",
                        crate::attempt::AttemptKind::Reversal(_) => "reversal",
                    },
                    original.outcome
                ),
            });
        }

        let reversal = PaymentAttempt::reversal(&original, reason);
        let (attempt, duplicate) = match self.store.insert_attempt(&reversal).await? {
            AttemptInsert::Inserted => (reversal, false),
            AttemptInsert::Duplicate(existing) => (existing, true),
        };

        if !duplicate {
            restate_bill(&self.store, &self.alerts, &self.policy, attempt.bill_id).await?;
            info!(original = %attempt_id, reversal = %attempt.id, "charge reversed");
        }

        Ok(SubmitReceipt { attempt, duplicate })
    }

    /// Restates a bill from its attempt ledger; see [`restate_bill`]
    pub async fn restate(&self, bill_id: BillId) -> Result<Bill, LedgerError> {
        restate_bill(&self.store, &self.alerts, &self.policy, bill_id).await
    }
}

/// Recomputes a bill's settled total from the attempt ledger and applies it
///
/// This is the one place bill money state is derived: sum every attempt's
/// settled contribution, hand the absolute total to the bill, persist via
/// compare-and-swap, and publish any alert-worthy events. A lost CAS race
/// re-reads and recomputes; the loop is bounded and a persistent loser
/// surfaces `PortError::Conflict` to the caller.
///
/// High-value marking follows the one-shot marker on the bill: the alert
/// fires when the cumulative settled total, or any single settled charge,
/// reaches the policy threshold, and never again for the same bill.
pub(crate) async fn restate_bill(
    store: &Arc<dyn LedgerStore>,
    alerts: &Arc<dyn AlertSink>,
    policy: &LedgerPolicy,
    bill_id: BillId,
) -> Result<Bill, LedgerError> {
    let mut last_err: Option<PortError> = None;

    for _ in 0..CAS_RETRIES {
        let mut bill = store.load_bill(bill_id).await?;
        let read_version = bill.version;
        let attempts = store.attempts_for_bill(bill_id).await?;

        let mut settled = Money::zero(bill.currency());
        let mut largest_charge = Money::zero(bill.currency());
        for attempt in &attempts {
            settled = settled.checked_add(&attempt.settled_contribution())?;
            if attempt.is_settled_charge()
                && attempt.amount.checked_cmp(&largest_charge)? == std::cmp::Ordering::Greater
            {
                largest_charge = attempt.amount;
            }
        }

        let settlement = bill.apply_settlement(settled, policy.tolerance());
        let overpayment = match settlement {
            Ok(_) => None,
            Err(err @ BillingError::OverpaymentExceeded { .. }) => Some(err),
            Err(err) => return Err(err.into()),
        };

        let threshold = policy.threshold();
        if settled.checked_cmp(&threshold)? != std::cmp::Ordering::Less
            || largest_charge.checked_cmp(&threshold)? != std::cmp::Ordering::Less
        {
            bill.mark_high_value();
        }

        let events = bill.take_events();

        if bill.version != read_version {
            match store.update_bill(&bill, read_version).await {
                Ok(()) => {}
                Err(err @ PortError::Conflict { .. }) => {
                    debug!(%bill_id, "lost bill update race, retrying restatement");
                    last_err = Some(err);
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }

        publish_alerts(alerts, &bill, events).await;

        return match overpayment {
            Some(err) => Err(err.into()),
            None => Ok(bill),
        };
    }

    Err(last_err
        .unwrap_or_else(|| PortError::conflict("bill restatement retries exhausted"))
        .into())
}

/// Publishes alert-worthy bill events; delivery failures are logged, never
/// propagated into the payment path
async fn publish_alerts(alerts: &Arc<dyn AlertSink>, bill: &Bill, events: Vec<BillEvent>) {
    for event in events {
        let alert = match &event {
            BillEvent::OverpaymentDetected {
                total,
                paid_to_date,
                ..
            } => Some(AlertEvent::new(
                bill.id,
                bill.store_id,
                AlertKind::Overpayment,
                format!("collected {} against a total of {}", paid_to_date, total),
            )),
            BillEvent::HighValueFlagged { paid_to_date, .. } => Some(AlertEvent::new(
                bill.id,
                bill.store_id,
                AlertKind::HighValue,
                format!("cumulative settled total reached {}", paid_to_date),
            )),
            _ => {
                debug!(?event, "bill event");
                None
            }
        };

        if let Some(alert) = alert {
            if let Err(err) = alerts.publish(alert).await {
                warn!(bill_id = %bill.id, %err, "alert publish failed");
            }
        }
    }
}
