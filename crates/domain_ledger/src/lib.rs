//! Payment Ledger Domain - append-only money movement for laundry bills
//!
//! This crate owns every money-affecting operation in the system:
//!
//! - **Payment attempts** are append-only records; a settled or failed
//!   attempt is never edited, and corrections are new reversal records.
//! - **Exactly-once submission**: the storage layer enforces a
//!   single-writer-wins constraint on `(store, idempotency key)`; the loser
//!   of a race reads back the winner's outcome instead of erroring.
//! - **Reconciliation** recomputes bill balances strictly from the attempt
//!   ledger, corrects drift through lifecycle transitions, and raises
//!   alerts for overpayments, high-value activity, and discrepancies.
//!
//! Storage, the payment gateway, and alert delivery are ports; adapters live
//! in [`adapters`] (in-memory) and in `infra_db` (PostgreSQL).

pub mod adapters;
pub mod alerts;
pub mod attempt;
pub mod config;
pub mod error;
pub mod gateway;
pub mod reconcile;
pub mod report;
pub mod service;
pub mod store;

pub use alerts::{AlertEvent, AlertKind, AlertSink};
pub use attempt::{AttemptKind, AttemptOutcome, PaymentAttempt, PaymentChannel};
pub use config::LedgerPolicy;
pub use error::LedgerError;
pub use gateway::{GatewayOutcome, PaymentGateway};
pub use reconcile::{ReconcileOutcome, ReconciliationEngine, SweepReport};
pub use report::StoreSummary;
pub use service::{PaymentLedger, SubmitReceipt};
pub use store::{AttemptInsert, LedgerStore};
