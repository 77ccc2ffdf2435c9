//! Billing domain errors

use core_kernel::MoneyError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur in the billing domain
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BillingError {
    /// Bill total or payment amount is not strictly positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Requested transition is not allowed from the current state
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Settled total exceeds the bill total beyond the configured tolerance
    #[error("Overpayment exceeded: paid {paid} against total {total} (tolerance {tolerance})")]
    OverpaymentExceeded {
        total: Decimal,
        paid: Decimal,
        tolerance: Decimal,
    },

    /// Void requested on a bill that has settled payments or is terminal
    #[error("Void not allowed: {0}")]
    VoidNotAllowed(String),

    /// Caller's version is stale; re-read and retry
    #[error("Concurrent modification: expected version {expected}, found {actual}")]
    ConcurrentModification { expected: u32, actual: u32 },

    /// Currency mismatch or other money arithmetic failure
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),
}
