//! Operational alerts raised by the ledger

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{AlertId, BillId, DomainPort, PortError, StoreId};

/// Category of an operational alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A bill collected more than its total plus the configured tolerance
    Overpayment,
    /// A bill's collected amount crossed the high-value threshold
    HighValue,
    /// Reconciliation found and corrected a stale bill
    Discrepancy,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Overpayment => "overpayment",
            AlertKind::HighValue => "high_value",
            AlertKind::Discrepancy => "discrepancy",
        }
    }
}

/// An alert emitted for operator attention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: AlertId,
    pub bill_id: BillId,
    pub store_id: StoreId,
    pub kind: AlertKind,
    pub details: String,
    pub occurred_at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn new(bill_id: BillId, store_id: StoreId, kind: AlertKind, details: String) -> Self {
        Self {
            id: AlertId::new(),
            bill_id,
            store_id,
            kind,
            details,
            occurred_at: Utc::now(),
        }
    }
}

/// Port for delivering alerts to an operator-facing channel
///
/// Delivery is best-effort from the ledger's point of view: callers log a
/// failed publish and move on rather than failing the payment path.
#[async_trait]
pub trait AlertSink: DomainPort {
    async fn publish(&self, event: AlertEvent) -> Result<(), PortError>;
}
