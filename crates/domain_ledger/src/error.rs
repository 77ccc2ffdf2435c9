//! Ledger domain errors

use core_kernel::{IdempotencyKeyError, MoneyError, PaymentAttemptId, PortError};
use domain_billing::BillingError;
use thiserror::Error;

use crate::attempt::AttemptOutcome;

/// Errors that can occur in the payment ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Lifecycle rejection (invalid amount/transition, overpayment, stale version)
    #[error(transparent)]
    Billing(#[from] BillingError),

    /// Storage or collaborator failure
    #[error(transparent)]
    Port(#[from] PortError),

    /// Payment amount is not strictly positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Idempotency key failed validation
    #[error("Invalid idempotency key: {0}")]
    InvalidKey(#[from] IdempotencyKeyError),

    /// Unknown payment channel name
    #[error("Unknown payment channel: {0}")]
    UnknownChannel(String),

    /// Gateway did not answer within the bounded wait; the attempt is left
    /// pending for the reconciliation sweep
    #[error("Gateway timeout after {timeout_ms}ms; attempt {attempt_id} left pending")]
    GatewayTimeout {
        attempt_id: PaymentAttemptId,
        timeout_ms: u64,
    },

    /// Attempted to finalize an attempt that already reached a final outcome
    #[error("Attempt {attempt_id} already has final outcome {outcome}")]
    OutcomeFinal {
        attempt_id: PaymentAttemptId,
        outcome: AttemptOutcome,
    },

    /// A late gateway confirmation contradicts the recorded final outcome
    #[error("Attempt {attempt_id} recorded as {recorded}, gateway reported {reported}")]
    OutcomeConflict {
        attempt_id: PaymentAttemptId,
        recorded: AttemptOutcome,
        reported: AttemptOutcome,
    },

    /// Only settled charges can be reversed
    #[error("Attempt {attempt_id} is not reversible (kind/outcome: {detail})")]
    NotReversible {
        attempt_id: PaymentAttemptId,
        detail: String,
    },

    /// Currency mismatch in balance computation
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),
}

impl LedgerError {
    /// True when the caller should re-read and retry
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Billing(BillingError::ConcurrentModification { .. }) => true,
            LedgerError::Port(e) => e.is_transient(),
            _ => false,
        }
    }
}
