//! Read-only store aggregates
//!
//! Everything here is derived from persisted bill state at call time; the
//! ledger keeps no in-memory-only balances.

use serde::{Deserialize, Serialize};

use core_kernel::{Currency, Money, StoreId};

use crate::error::LedgerError;
use crate::service::PaymentLedger;

/// Per-store aggregate view for the reporting read model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub store_id: StoreId,
    pub currency: Currency,
    /// Outstanding balance across bills still accepting payment
    pub open_balance: Money,
    /// Settled money across all bills, including overpaid ones
    pub paid_total: Money,
    /// Bills with at least one alert marker set
    pub alert_count: usize,
    pub bill_count: usize,
}

impl PaymentLedger {
    /// Builds the per-store aggregate view from persisted bills
    pub async fn store_summary(&self, store_id: StoreId) -> Result<StoreSummary, LedgerError> {
        let currency = self.policy().currency;
        let bills = self.store().bills_for_store(store_id).await?;

        let mut open_balance = Money::zero(currency);
        let mut paid_total = Money::zero(currency);
        let mut alert_count = 0;

        for bill in &bills {
            if bill.is_payable() {
                open_balance = open_balance.checked_add(&bill.balance_due())?;
            }
            paid_total = paid_total.checked_add(&bill.paid_to_date)?;
            if bill.overpayment_alerted || bill.high_value_alerted {
                alert_count += 1;
            }
        }

        Ok(StoreSummary {
            store_id,
            currency,
            open_balance,
            paid_total,
            alert_count,
            bill_count: bills.len(),
        })
    }
}
