//! Payment attempt records
//!
//! A `PaymentAttempt` is one try at paying some amount against one bill via
//! one channel. The ledger is append-only: once an attempt reaches a final
//! outcome it is immutable, and a reversal is a new record with negative
//! effect, never an edit of the original.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{BillId, IdempotencyKey, Money, PaymentAttemptId, StoreId};

use crate::error::LedgerError;

/// Payment channels supported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentChannel {
    /// Cash logged at the counter
    Cash,
    /// UPI transfer
    Upi,
    /// Wallet balance
    Wallet,
    /// Credit or debit card
    Card,
}

impl PaymentChannel {
    /// Returns the wire name used in persistence and APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentChannel::Cash => "cash",
            PaymentChannel::Upi => "upi",
            PaymentChannel::Wallet => "wallet",
            PaymentChannel::Card => "card",
        }
    }
}

impl fmt::Display for PaymentChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentChannel {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentChannel::Cash),
            "upi" => Ok(PaymentChannel::Upi),
            "wallet" => Ok(PaymentChannel::Wallet),
            "card" => Ok(PaymentChannel::Card),
            other => Err(LedgerError::UnknownChannel(other.to_string())),
        }
    }
}

/// Outcome of a payment attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    /// Submitted; gateway outcome not yet known
    Pending,
    /// Funds confirmed received
    Settled,
    /// Gateway reported failure, or the pending window elapsed
    Failed,
    /// Reversal record offsetting a settled charge
    Reversed,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Pending => "pending",
            AttemptOutcome::Settled => "settled",
            AttemptOutcome::Failed => "failed",
            AttemptOutcome::Reversed => "reversed",
        }
    }

    /// True once the outcome can no longer change
    pub fn is_final(&self) -> bool {
        !matches!(self, AttemptOutcome::Pending)
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a record charges the customer or offsets an earlier charge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "original")]
pub enum AttemptKind {
    /// A charge against the bill
    Charge,
    /// An offsetting record for a previously settled charge
    Reversal(PaymentAttemptId),
}

/// One try at paying some amount against one bill via one channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAttempt {
    /// Unique identifier
    pub id: PaymentAttemptId,
    /// Bill this attempt pays against
    pub bill_id: BillId,
    /// Store scope; the idempotency key is unique within it
    pub store_id: StoreId,
    /// Amount, always positive; the kind determines the sign of its effect
    pub amount: Money,
    /// Channel the payment was made through
    pub channel: PaymentChannel,
    /// Caller-supplied exactly-once token
    pub idempotency_key: IdempotencyKey,
    /// Charge or reversal
    pub kind: AttemptKind,
    /// Current outcome
    pub outcome: AttemptOutcome,
    /// Failure or reversal reason, when applicable
    pub note: Option<String>,
    /// When the attempt was created
    pub created_at: DateTime<Utc>,
    /// When the outcome became final
    pub settled_at: Option<DateTime<Utc>>,
}

impl PaymentAttempt {
    /// Creates a new pending charge attempt
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` if the amount is not strictly positive
    pub fn charge(
        bill_id: BillId,
        store_id: StoreId,
        amount: Money,
        channel: PaymentChannel,
        idempotency_key: IdempotencyKey,
    ) -> Result<Self, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(format!(
                "payment amount must be positive, got {}",
                amount
            )));
        }

        Ok(Self {
            id: PaymentAttemptId::new_v7(),
            bill_id,
            store_id,
            amount,
            channel,
            idempotency_key,
            kind: AttemptKind::Charge,
            outcome: AttemptOutcome::Pending,
            note: None,
            created_at: Utc::now(),
            settled_at: None,
        })
    }

    /// Creates a reversal record offsetting a settled charge
    ///
    /// The reversal is final from birth and carries a key derived from the
    /// original attempt, so reversing the same attempt twice is caught by
    /// the same storage constraint as a duplicate submission.
    pub fn reversal(original: &PaymentAttempt, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        // "rev-<uuid>" stays well inside the 64-char key limit.
        let key = IdempotencyKey::new(format!("rev-{}", original.id.as_uuid()))
            .unwrap_or_else(|_| original.idempotency_key.clone());

        Self {
            id: PaymentAttemptId::new_v7(),
            bill_id: original.bill_id,
            store_id: original.store_id,
            amount: original.amount,
            channel: original.channel,
            idempotency_key: key,
            kind: AttemptKind::Reversal(original.id),
            outcome: AttemptOutcome::Reversed,
            note: Some(reason.into()),
            created_at: now,
            settled_at: Some(now),
        }
    }

    /// The attempt's contribution to a bill's settled total
    ///
    /// Settled charges count positively, reversal records negatively,
    /// everything else not at all.
    pub fn settled_contribution(&self) -> Money {
        match (self.kind, self.outcome) {
            (AttemptKind::Charge, AttemptOutcome::Settled) => self.amount,
            (AttemptKind::Reversal(_), AttemptOutcome::Reversed) => -self.amount,
            _ => Money::zero(self.amount.currency()),
        }
    }

    /// True while the gateway outcome is unknown
    pub fn is_pending(&self) -> bool {
        self.outcome == AttemptOutcome::Pending
    }

    /// True for a settled charge (the only reversible record)
    pub fn is_settled_charge(&self) -> bool {
        self.kind == AttemptKind::Charge && self.outcome == AttemptOutcome::Settled
    }

    /// Marks a pending attempt as settled
    ///
    /// # Errors
    ///
    /// Returns `OutcomeFinal` if the attempt already reached a final outcome
    pub fn mark_settled(&mut self) -> Result<(), LedgerError> {
        self.require_pending()?;
        self.outcome = AttemptOutcome::Settled;
        self.settled_at = Some(Utc::now());
        Ok(())
    }

    /// Marks a pending attempt as failed
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), LedgerError> {
        self.require_pending()?;
        self.outcome = AttemptOutcome::Failed;
        self.note = Some(reason.into());
        self.settled_at = Some(Utc::now());
        Ok(())
    }

    fn require_pending(&self) -> Result<(), LedgerError> {
        if self.outcome.is_final() {
            return Err(LedgerError::OutcomeFinal {
                attempt_id: self.id,
                outcome: self.outcome,
            });
        }
        Ok(())
    }
}
