//! Domain events for the bill aggregate
//!
//! Events capture every accepted state change for audit trails and for
//! driving downstream alerting. They are drained from the aggregate with
//! [`crate::Bill::take_events`] after a successful save.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{BillId, StoreId};

/// Domain events emitted by the Bill aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BillEvent {
    /// Bill has been created in Draft
    BillCreated {
        bill_id: BillId,
        store_id: StoreId,
        total: Decimal,
        timestamp: DateTime<Utc>,
    },

    /// Bill moved from Draft to Open
    BillOpened {
        bill_id: BillId,
        timestamp: DateTime<Utc>,
    },

    /// Ledger-derived settled total was applied to the bill
    SettlementApplied {
        bill_id: BillId,
        paid_to_date: Decimal,
        state: String,
        timestamp: DateTime<Utc>,
    },

    /// Bill reached its total and transitioned to Paid
    BillPaid {
        bill_id: BillId,
        timestamp: DateTime<Utc>,
    },

    /// Bill was voided by an administrator
    BillVoided {
        bill_id: BillId,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Settled total exceeded the bill total beyond tolerance
    ///
    /// Emitted once per crossing; the `overpayment_alerted` marker on the
    /// bill keeps repeated recomputations from re-emitting it.
    OverpaymentDetected {
        bill_id: BillId,
        total: Decimal,
        paid_to_date: Decimal,
        timestamp: DateTime<Utc>,
    },

    /// Cumulative paid total crossed the high-value threshold
    HighValueFlagged {
        bill_id: BillId,
        paid_to_date: Decimal,
        timestamp: DateTime<Utc>,
    },
}
