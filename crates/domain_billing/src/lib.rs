//! Billing Domain - Bill Lifecycle State Machine
//!
//! This crate owns a bill's states and the transitions between them. Bills
//! are the money-owing side of the ledger: created when a laundry order is
//! finalised, opened for payment, and driven to `Paid` or `Voided` purely by
//! ledger events.
//!
//! # Lifecycle
//!
//! ```text
//! Draft ──open──▶ Open ──settlement──▶ PartiallyPaid ──settlement──▶ Paid
//!                  │                        │
//!                  └────────void────────────┘   (only with zero settled payments)
//! ```
//!
//! `Paid` and `Voided` are terminal for external callers. Ledger-derived
//! recomputation (reversals, reconciliation) may restate a bill's position,
//! which is why `apply_settlement` accepts an absolute settled total rather
//! than a delta.
//!
//! # Concurrency
//!
//! Every accepted mutation bumps the bill's version counter. Callers supply
//! the version they read; a stale version fails with
//! [`BillingError::ConcurrentModification`] and leaves the bill unchanged.

pub mod bill;
pub mod error;
pub mod events;

pub use bill::{Bill, BillState, SettlementOutcome};
pub use error::BillingError;
pub use events::BillEvent;
