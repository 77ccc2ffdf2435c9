//! Reconciliation engine
//!
//! Runs periodically and on demand to verify that every bill's state
//! matches what its attempt ledger says, correct drift, and resolve
//! abandoned pending attempts. Both entry points are idempotent: a second
//! run over an unchanged ledger makes no writes, and the only alert that
//! re-raises is the one for settled money on a voided bill, which stands
//! until the stray attempt is dealt with.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use core_kernel::{BillId, Money, StoreId};
use domain_billing::BillingError;

use crate::alerts::{AlertEvent, AlertKind, AlertSink};
use crate::config::LedgerPolicy;
use crate::error::LedgerError;
use crate::service::restate_bill;
use crate::store::LedgerStore;

/// What a single-bill reconciliation found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub bill_id: BillId,
    /// True when the bill's recorded balance or state disagreed with the
    /// ledger and was corrected
    pub corrected: bool,
    /// True when the ledger total sits beyond the overpayment tolerance
    pub overpaid: bool,
}

/// Summary of one sweep over a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub store_id: StoreId,
    pub bills_examined: usize,
    pub bills_corrected: usize,
    /// Pending attempts older than the policy window that were failed
    pub attempts_timed_out: usize,
    /// Pass this into the next sweep's `since` to avoid re-scanning
    pub high_water_mark: DateTime<Utc>,
}

/// Verifies ledger-derived balances against bill state
pub struct ReconciliationEngine {
    store: Arc<dyn LedgerStore>,
    alerts: Arc<dyn AlertSink>,
    policy: LedgerPolicy,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        alerts: Arc<dyn AlertSink>,
        policy: LedgerPolicy,
    ) -> Self {
        Self {
            store,
            alerts,
            policy,
        }
    }

    /// Recomputes one bill's balance from its attempts and corrects drift
    ///
    /// A corrected bill raises a discrepancy alert naming the stale and
    /// recomputed values; a consistent bill produces no write and no alert.
    #[instrument(skip(self), fields(%bill_id))]
    pub async fn reconcile_bill(&self, bill_id: BillId) -> Result<ReconcileOutcome, LedgerError> {
        let before = self.store.load_bill(bill_id).await?;
        let stale_paid = before.paid_to_date;
        let stale_version = before.version;

        // Draft bills carry no money and never restate.
        if matches!(before.state, domain_billing::BillState::Draft) {
            debug!(%bill_id, "draft bill, skipping");
            return Ok(ReconcileOutcome {
                bill_id,
                corrected: false,
                overpaid: false,
            });
        }

        // Voided bills never restate either, but money settling against
        // one (a late confirmation racing the void) is an anomaly that
        // must surface. The alert re-raises every pass until an operator
        // reverses the stray attempt.
        if matches!(before.state, domain_billing::BillState::Voided { .. }) {
            let settled = self.settled_total(&before).await?;
            if !settled.amount().is_zero() {
                warn!(%bill_id, %settled, "voided bill holds settled money");
                self.publish_alert(
                    &before,
                    format!("voided bill holds settled payments totalling {}", settled),
                )
                .await;
            }
            return Ok(ReconcileOutcome {
                bill_id,
                corrected: false,
                overpaid: false,
            });
        }

        let result = restate_bill(&self.store, &self.alerts, &self.policy, bill_id).await;
        let (after, overpaid) = match result {
            Ok(bill) => (bill, false),
            Err(LedgerError::Billing(BillingError::OverpaymentExceeded { .. })) => {
                // The overpayment alert has already fired (or fired earlier
                // and is suppressed by the bill's marker). Re-read for the
                // recorded totals.
                (self.store.load_bill(bill_id).await?, true)
            }
            Err(err) => return Err(err),
        };

        let corrected = after.version != stale_version;
        if corrected {
            self.publish_discrepancy(&after, stale_paid).await;
            info!(
                %bill_id,
                stale = %stale_paid,
                recomputed = %after.paid_to_date,
                "bill drift corrected"
            );
        } else {
            debug!(%bill_id, "bill consistent with ledger");
        }

        Ok(ReconcileOutcome {
            bill_id,
            corrected,
            overpaid,
        })
    }

    /// Sweeps a store: times out abandoned pending attempts, then
    /// reconciles every bill modified since the checkpoint
    ///
    /// Attempts left pending longer than the policy window are failed
    /// first, so their bills show up in the same pass as modified. The
    /// sweep is idempotent; alert markers on the bills keep a re-run from
    /// duplicating alerts.
    #[instrument(skip(self), fields(%store_id))]
    pub async fn sweep(
        &self,
        store_id: StoreId,
        since: DateTime<Utc>,
    ) -> Result<SweepReport, LedgerError> {
        let high_water_mark = Utc::now();
        let cutoff = high_water_mark - self.policy.pending_window();

        let mut attempts_timed_out = 0;
        for mut attempt in self.store.pending_attempts_before(store_id, cutoff).await? {
            if attempt.mark_failed("pending window elapsed").is_ok() {
                self.store.finalize_attempt(&attempt).await?;
                attempts_timed_out += 1;
                warn!(attempt_id = %attempt.id, "timed out abandoned pending attempt");
            }
        }

        let bills = self.store.bills_modified_since(store_id, since).await?;
        let mut bills_corrected = 0;
        let bills_examined = bills.len();
        for bill in &bills {
            let outcome = self.reconcile_bill(bill.id).await?;
            if outcome.corrected {
                bills_corrected += 1;
            }
        }

        info!(
            %store_id,
            bills_examined,
            bills_corrected,
            attempts_timed_out,
            "sweep complete"
        );

        Ok(SweepReport {
            store_id,
            bills_examined,
            bills_corrected,
            attempts_timed_out,
            high_water_mark,
        })
    }

    async fn publish_discrepancy(&self, bill: &domain_billing::Bill, stale_paid: Money) {
        self.publish_alert(
            bill,
            format!(
                "recorded paid total {} restated to {}",
                stale_paid, bill.paid_to_date
            ),
        )
        .await;
    }

    async fn publish_alert(&self, bill: &domain_billing::Bill, details: String) {
        let alert = AlertEvent::new(bill.id, bill.store_id, AlertKind::Discrepancy, details);
        if let Err(err) = self.alerts.publish(alert).await {
            warn!(bill_id = %bill.id, %err, "alert publish failed");
        }
    }

    async fn settled_total(&self, bill: &domain_billing::Bill) -> Result<Money, LedgerError> {
        let attempts = self.store.attempts_for_bill(bill.id).await?;
        let mut settled = Money::zero(bill.currency());
        for attempt in &attempts {
            settled = settled.checked_add(&attempt.settled_contribution())?;
        }
        Ok(settled)
    }
}
