//! Bill aggregate root
//!
//! The Bill is the consistency boundary for everything a customer owes a
//! store. Its state is never mutated directly by payment code: the ledger
//! recomputes the settled total from payment attempts and asks the bill to
//! restate itself via [`Bill::apply_settlement`].
//!
//! # Invariants
//!
//! - The total is strictly positive and immutable after creation
//! - `paid_to_date` always equals the ledger-derived settled total last applied
//! - The version counter strictly increases with every accepted mutation
//! - Alert markers (`overpayment_alerted`, `high_value_alerted`) are one-shot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BillId, CustomerId, Money, StoreId};

use crate::error::BillingError;
use crate::events::BillEvent;

/// Bill lifecycle states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillState {
    /// Created but not yet payable
    Draft,
    /// Payable, nothing settled yet
    Open,
    /// Some but not all of the total is settled
    PartiallyPaid,
    /// Settled in full (within tolerance); terminal for external callers
    Paid,
    /// Cancelled by an administrator; terminal
    Voided { reason: String },
}

impl BillState {
    /// Returns the state name used in errors and persistence
    pub fn name(&self) -> &'static str {
        match self {
            BillState::Draft => "Draft",
            BillState::Open => "Open",
            BillState::PartiallyPaid => "PartiallyPaid",
            BillState::Paid => "Paid",
            BillState::Voided { .. } => "Voided",
        }
    }
}

/// Result of applying a ledger-derived settled total
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// The bill already reflected this settled total
    Unchanged,
    /// The bill restated its position
    Applied { state: BillState },
}

/// The Bill aggregate root
///
/// Bills are never deleted; they only move to a terminal state. All
/// money-driven transitions flow through [`Bill::apply_settlement`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    /// Unique bill identifier
    pub id: BillId,
    /// Store this bill belongs to
    pub store_id: StoreId,
    /// Customer who owes the bill
    pub customer_id: CustomerId,
    /// Line-item total; immutable after creation
    pub total: Money,
    /// Ledger-derived settled total last applied
    pub paid_to_date: Money,
    /// Current lifecycle state
    pub state: BillState,
    /// One-shot marker: overpayment alert already raised
    pub overpayment_alerted: bool,
    /// One-shot marker: high-value alert already raised
    pub high_value_alerted: bool,
    /// Version for optimistic concurrency
    pub version: u32,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Domain events pending publication
    #[serde(skip)]
    events: Vec<BillEvent>,
}

impl Bill {
    /// Creates a new bill in `Draft`
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` if the total is not strictly positive
    pub fn create(
        store_id: StoreId,
        customer_id: CustomerId,
        total: Money,
    ) -> Result<Self, BillingError> {
        if !total.is_positive() {
            return Err(BillingError::InvalidAmount(format!(
                "bill total must be positive, got {}",
                total
            )));
        }

        let now = Utc::now();
        let id = BillId::new_v7();

        let mut bill = Self {
            id,
            store_id,
            customer_id,
            total,
            paid_to_date: Money::zero(total.currency()),
            state: BillState::Draft,
            overpayment_alerted: false,
            high_value_alerted: false,
            version: 1,
            created_at: now,
            updated_at: now,
            events: Vec::new(),
        };

        bill.events.push(BillEvent::BillCreated {
            bill_id: id,
            store_id,
            total: total.amount(),
            timestamp: now,
        });

        Ok(bill)
    }

    /// Rebuilds a bill from persisted state
    ///
    /// Used by storage adapters; the event buffer starts empty.
    #[allow(clippy::too_many_arguments)]
    pub fn rehydrate(
        id: BillId,
        store_id: StoreId,
        customer_id: CustomerId,
        total: Money,
        paid_to_date: Money,
        state: BillState,
        overpayment_alerted: bool,
        high_value_alerted: bool,
        version: u32,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            store_id,
            customer_id,
            total,
            paid_to_date,
            state,
            overpayment_alerted,
            high_value_alerted,
            version,
            created_at,
            updated_at,
            events: Vec::new(),
        }
    }

    /// Returns accumulated domain events and clears them
    pub fn take_events(&mut self) -> Vec<BillEvent> {
        std::mem::take(&mut self.events)
    }

    /// Returns the bill's currency
    pub fn currency(&self) -> core_kernel::Currency {
        self.total.currency()
    }

    /// Returns the outstanding balance (may be negative when overpaid)
    pub fn balance_due(&self) -> Money {
        self.total - self.paid_to_date
    }

    /// True if the bill can accept payments
    pub fn is_payable(&self) -> bool {
        matches!(self.state, BillState::Open | BillState::PartiallyPaid)
    }

    /// True if the bill is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, BillState::Paid | BillState::Voided { .. })
    }

    /// Verifies the caller's read version against the current one
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentModification` when the versions differ; the caller
    /// must re-read and retry.
    pub fn require_version(&self, expected: u32) -> Result<(), BillingError> {
        if self.version != expected {
            return Err(BillingError::ConcurrentModification {
                expected,
                actual: self.version,
            });
        }
        Ok(())
    }

    /// Opens the bill for payment: `Draft -> Open`
    pub fn open(&mut self) -> Result<(), BillingError> {
        match self.state {
            BillState::Draft => {
                self.state = BillState::Open;
                self.bump();
                self.events.push(BillEvent::BillOpened {
                    bill_id: self.id,
                    timestamp: self.updated_at,
                });
                Ok(())
            }
            _ => Err(BillingError::InvalidTransition {
                from: self.state.name().to_string(),
                to: "Open".to_string(),
            }),
        }
    }

    /// Applies the ledger-derived settled total to the bill
    ///
    /// The caller (payment ledger or reconciliation engine) recomputes the
    /// settled total strictly from payment attempts and passes it here as an
    /// absolute value. The bill restates itself:
    ///
    /// - zero settled        -> `Open`
    /// - 0 < settled < total -> `PartiallyPaid`
    /// - settled >= total    -> `Paid` (within tolerance)
    ///
    /// # Errors
    ///
    /// - `InvalidTransition` from `Draft` or `Voided`
    /// - `OverpaymentExceeded` when the settled total is beyond
    ///   `total + tolerance`. The overpaid amount is still recorded and the
    ///   one-shot overpayment marker set, but the state does not advance.
    ///   No event or version bump occurs on a repeated identical call.
    pub fn apply_settlement(
        &mut self,
        settled_total: Money,
        tolerance: Money,
    ) -> Result<SettlementOutcome, BillingError> {
        match self.state {
            BillState::Draft | BillState::Voided { .. } => {
                return Err(BillingError::InvalidTransition {
                    from: self.state.name().to_string(),
                    to: "PartiallyPaid".to_string(),
                });
            }
            _ => {}
        }

        let limit = self.total.checked_add(&tolerance)?;
        if settled_total.checked_cmp(&limit)? == std::cmp::Ordering::Greater {
            let changed = self.paid_to_date != settled_total || !self.overpayment_alerted;
            self.paid_to_date = settled_total;
            if !self.overpayment_alerted {
                self.overpayment_alerted = true;
                self.events.push(BillEvent::OverpaymentDetected {
                    bill_id: self.id,
                    total: self.total.amount(),
                    paid_to_date: settled_total.amount(),
                    timestamp: Utc::now(),
                });
            }
            if changed {
                self.bump();
            }
            return Err(BillingError::OverpaymentExceeded {
                total: self.total.amount(),
                paid: settled_total.amount(),
                tolerance: tolerance.amount(),
            });
        }

        let target = if settled_total.is_zero() {
            BillState::Open
        } else if settled_total.checked_cmp(&self.total)? == std::cmp::Ordering::Less {
            BillState::PartiallyPaid
        } else {
            BillState::Paid
        };

        if self.paid_to_date == settled_total && self.state == target {
            return Ok(SettlementOutcome::Unchanged);
        }

        let was_paid = matches!(self.state, BillState::Paid);
        self.paid_to_date = settled_total;
        self.state = target.clone();
        self.bump();

        self.events.push(BillEvent::SettlementApplied {
            bill_id: self.id,
            paid_to_date: settled_total.amount(),
            state: target.name().to_string(),
            timestamp: self.updated_at,
        });
        if matches!(target, BillState::Paid) && !was_paid {
            self.events.push(BillEvent::BillPaid {
                bill_id: self.id,
                timestamp: self.updated_at,
            });
        }

        Ok(SettlementOutcome::Applied { state: target })
    }

    /// Voids the bill; admin-only, and only before any money has settled
    pub fn void(&mut self, reason: impl Into<String>) -> Result<(), BillingError> {
        match self.state {
            BillState::Open | BillState::PartiallyPaid => {
                if !self.paid_to_date.is_zero() {
                    return Err(BillingError::VoidNotAllowed(format!(
                        "bill has settled payments ({})",
                        self.paid_to_date
                    )));
                }
                let reason = reason.into();
                self.state = BillState::Voided {
                    reason: reason.clone(),
                };
                self.bump();
                self.events.push(BillEvent::BillVoided {
                    bill_id: self.id,
                    reason,
                    timestamp: self.updated_at,
                });
                Ok(())
            }
            _ => Err(BillingError::VoidNotAllowed(format!(
                "cannot void a bill in state {}",
                self.state.name()
            ))),
        }
    }

    /// Sets the one-shot high-value marker
    ///
    /// Returns true if the marker was newly set (the alert should fire),
    /// false if it had already fired for this bill.
    pub fn mark_high_value(&mut self) -> bool {
        if self.high_value_alerted {
            return false;
        }
        self.high_value_alerted = true;
        self.bump();
        self.events.push(BillEvent::HighValueFlagged {
            bill_id: self.id,
            paid_to_date: self.paid_to_date.amount(),
            timestamp: self.updated_at,
        });
        true
    }

    fn bump(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}
