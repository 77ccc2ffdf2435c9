//! PostgreSQL implementation of the ledger storage port
//!
//! Two guarantees the domain relies on are enforced here:
//!
//! - the `(store_id, idempotency_key)` unique constraint makes attempt
//!   insertion single-writer-wins; the losing writer reads the winner's
//!   row back instead of erroring
//! - bill updates run as `UPDATE ... WHERE version = $expected`, so a lost
//!   optimistic-concurrency race surfaces as a conflict the caller retries

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use core_kernel::{
    BillId, Currency, CustomerId, DomainPort, IdempotencyKey, Money, PaymentAttemptId, PortError,
    StoreId,
};
use domain_billing::{Bill, BillState};
use domain_ledger::{AttemptInsert, AttemptKind, AttemptOutcome, LedgerStore, PaymentAttempt,
    PaymentChannel};

use crate::error::DatabaseError;

/// Repository for bills and payment attempts
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct BillRow {
    bill_id: Uuid,
    store_id: Uuid,
    customer_id: Uuid,
    currency: String,
    total: Decimal,
    paid_to_date: Decimal,
    state: String,
    void_reason: Option<String>,
    overpayment_alerted: bool,
    high_value_alerted: bool,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BillRow {
    fn into_bill(self) -> Result<Bill, DatabaseError> {
        let currency = Currency::from_str(self.currency.trim())
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
        let state = match self.state.as_str() {
            "Draft" => BillState::Draft,
            "Open" => BillState::Open,
            "PartiallyPaid" => BillState::PartiallyPaid,
            "Paid" => BillState::Paid,
            "Voided" => BillState::Voided {
                reason: self.void_reason.clone().unwrap_or_default(),
            },
            other => {
                return Err(DatabaseError::SerializationError(format!(
                    "unknown bill state '{}'",
                    other
                )))
            }
        };

        Ok(Bill::rehydrate(
            BillId::from_uuid(self.bill_id),
            StoreId::from_uuid(self.store_id),
            CustomerId::from_uuid(self.customer_id),
            Money::new(self.total, currency),
            Money::new(self.paid_to_date, currency),
            state,
            self.overpayment_alerted,
            self.high_value_alerted,
            self.version as u32,
            self.created_at,
            self.updated_at,
        ))
    }
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    attempt_id: Uuid,
    bill_id: Uuid,
    store_id: Uuid,
    amount: Decimal,
    currency: String,
    channel: String,
    idempotency_key: String,
    original_attempt_id: Option<Uuid>,
    outcome: String,
    note: Option<String>,
    created_at: DateTime<Utc>,
    settled_at: Option<DateTime<Utc>>,
}

impl AttemptRow {
    fn into_attempt(self) -> Result<PaymentAttempt, DatabaseError> {
        let currency = Currency::from_str(self.currency.trim())
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
        let channel = PaymentChannel::from_str(&self.channel)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
        let outcome = match self.outcome.as_str() {
            "pending" => AttemptOutcome::Pending,
            "settled" => AttemptOutcome::Settled,
            "failed" => AttemptOutcome::Failed,
            "reversed" => AttemptOutcome::Reversed,
            other => {
                return Err(DatabaseError::SerializationError(format!(
                    "unknown attempt outcome '{}'",
                    other
                )))
            }
        };
        let kind = match self.original_attempt_id {
            Some(original) => AttemptKind::Reversal(PaymentAttemptId::from_uuid(original)),
            None => AttemptKind::Charge,
        };
        let idempotency_key = IdempotencyKey::new(self.idempotency_key)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        Ok(PaymentAttempt {
            id: PaymentAttemptId::from_uuid(self.attempt_id),
            bill_id: BillId::from_uuid(self.bill_id),
            store_id: StoreId::from_uuid(self.store_id),
            amount: Money::new(self.amount, currency),
            channel,
            idempotency_key,
            kind,
            outcome,
            note: self.note,
            created_at: self.created_at,
            settled_at: self.settled_at,
        })
    }
}

const SELECT_BILL: &str = "SELECT bill_id, store_id, customer_id, currency, total, paid_to_date, \
     state, void_reason, overpayment_alerted, high_value_alerted, version, created_at, updated_at \
     FROM bills";

const SELECT_ATTEMPT: &str = "SELECT attempt_id, bill_id, store_id, amount, currency, channel, \
     idempotency_key, original_attempt_id, outcome, note, created_at, settled_at \
     FROM payment_attempts";

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn state_columns(bill: &Bill) -> (&'static str, Option<String>) {
        match &bill.state {
            BillState::Draft => ("Draft", None),
            BillState::Open => ("Open", None),
            BillState::PartiallyPaid => ("PartiallyPaid", None),
            BillState::Paid => ("Paid", None),
            BillState::Voided { reason } => ("Voided", Some(reason.clone())),
        }
    }

    async fn fetch_attempt_by_key(
        &self,
        store_id: StoreId,
        key: &IdempotencyKey,
    ) -> Result<Option<PaymentAttempt>, DatabaseError> {
        let row: Option<AttemptRow> = sqlx::query_as(
            &format!("{} WHERE store_id = $1 AND idempotency_key = $2", SELECT_ATTEMPT),
        )
        .bind(*store_id.as_uuid())
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        row.map(AttemptRow::into_attempt).transpose()
    }
}

impl DomainPort for PostgresLedgerStore {}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn insert_bill(&self, bill: &Bill) -> Result<(), PortError> {
        let (state, void_reason) = Self::state_columns(bill);
        sqlx::query(
            "INSERT INTO bills (bill_id, store_id, customer_id, currency, total, paid_to_date, \
             state, void_reason, overpayment_alerted, high_value_alerted, version, created_at, \
             updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(*bill.id.as_uuid())
        .bind(*bill.store_id.as_uuid())
        .bind(*bill.customer_id.as_uuid())
        .bind(bill.currency().code())
        .bind(bill.total.amount())
        .bind(bill.paid_to_date.amount())
        .bind(state)
        .bind(void_reason)
        .bind(bill.overpayment_alerted)
        .bind(bill.high_value_alerted)
        .bind(bill.version as i32)
        .bind(bill.created_at)
        .bind(bill.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        Ok(())
    }

    async fn load_bill(&self, bill_id: BillId) -> Result<Bill, PortError> {
        let row: Option<BillRow> =
            sqlx::query_as(&format!("{} WHERE bill_id = $1", SELECT_BILL))
                .bind(*bill_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DatabaseError::from(&e))?;

        match row {
            Some(row) => Ok(row.into_bill()?),
            None => Err(PortError::not_found("Bill", bill_id)),
        }
    }

    async fn update_bill(&self, bill: &Bill, expected_version: u32) -> Result<(), PortError> {
        let (state, void_reason) = Self::state_columns(bill);
        let result = sqlx::query(
            "UPDATE bills SET paid_to_date = $1, state = $2, void_reason = $3, \
             overpayment_alerted = $4, high_value_alerted = $5, version = $6, updated_at = $7 \
             WHERE bill_id = $8 AND version = $9",
        )
        .bind(bill.paid_to_date.amount())
        .bind(state)
        .bind(void_reason)
        .bind(bill.overpayment_alerted)
        .bind(bill.high_value_alerted)
        .bind(bill.version as i32)
        .bind(bill.updated_at)
        .bind(*bill.id.as_uuid())
        .bind(expected_version as i32)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        if result.rows_affected() == 0 {
            // Distinguish a lost race from a missing bill.
            let exists: Option<BillRow> =
                sqlx::query_as(&format!("{} WHERE bill_id = $1", SELECT_BILL))
                    .bind(*bill.id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| DatabaseError::from(&e))?;
            return match exists {
                Some(row) => Err(PortError::conflict(format!(
                    "bill {} version is {}, expected {}",
                    bill.id, row.version, expected_version
                ))),
                None => Err(PortError::not_found("Bill", bill.id)),
            };
        }

        Ok(())
    }

    async fn insert_attempt(&self, attempt: &PaymentAttempt) -> Result<AttemptInsert, PortError> {
        let original = match attempt.kind {
            AttemptKind::Charge => None,
            AttemptKind::Reversal(id) => Some(*id.as_uuid()),
        };

        let result = sqlx::query(
            "INSERT INTO payment_attempts (attempt_id, bill_id, store_id, amount, currency, \
             channel, idempotency_key, original_attempt_id, outcome, note, created_at, settled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT ON CONSTRAINT uq_attempts_store_key DO NOTHING",
        )
        .bind(*attempt.id.as_uuid())
        .bind(*attempt.bill_id.as_uuid())
        .bind(*attempt.store_id.as_uuid())
        .bind(attempt.amount.amount())
        .bind(attempt.amount.currency().code())
        .bind(attempt.channel.as_str())
        .bind(attempt.idempotency_key.as_str())
        .bind(original)
        .bind(attempt.outcome.as_str())
        .bind(attempt.note.as_deref())
        .bind(attempt.created_at)
        .bind(attempt.settled_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        if result.rows_affected() == 1 {
            return Ok(AttemptInsert::Inserted);
        }

        // Lost the single-writer race; read the winner's record back.
        match self
            .fetch_attempt_by_key(attempt.store_id, &attempt.idempotency_key)
            .await?
        {
            Some(existing) => Ok(AttemptInsert::Duplicate(existing)),
            None => Err(PortError::internal(
                "attempt insert conflicted but no winning row is visible",
            )),
        }
    }

    async fn load_attempt(&self, attempt_id: PaymentAttemptId) -> Result<PaymentAttempt, PortError> {
        let row: Option<AttemptRow> =
            sqlx::query_as(&format!("{} WHERE attempt_id = $1", SELECT_ATTEMPT))
                .bind(*attempt_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DatabaseError::from(&e))?;

        match row {
            Some(row) => Ok(row.into_attempt()?),
            None => Err(PortError::not_found("PaymentAttempt", attempt_id)),
        }
    }

    async fn attempt_by_key(
        &self,
        store_id: StoreId,
        key: &IdempotencyKey,
    ) -> Result<Option<PaymentAttempt>, PortError> {
        Ok(self.fetch_attempt_by_key(store_id, key).await?)
    }

    async fn finalize_attempt(&self, attempt: &PaymentAttempt) -> Result<(), PortError> {
        // Only pending rows may change, and a re-application of the same
        // final outcome is a harmless no-op.
        let result = sqlx::query(
            "UPDATE payment_attempts SET outcome = $1, note = $2, settled_at = $3 \
             WHERE attempt_id = $4 AND (outcome = 'pending' OR outcome = $1)",
        )
        .bind(attempt.outcome.as_str())
        .bind(attempt.note.as_deref())
        .bind(attempt.settled_at)
        .bind(*attempt.id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        if result.rows_affected() == 0 {
            let existing = self.load_attempt(attempt.id).await?;
            return Err(PortError::conflict(format!(
                "attempt {} already finalized as {}",
                attempt.id, existing.outcome
            )));
        }

        Ok(())
    }

    async fn attempts_for_bill(&self, bill_id: BillId) -> Result<Vec<PaymentAttempt>, PortError> {
        let rows: Vec<AttemptRow> = sqlx::query_as(&format!(
            "{} WHERE bill_id = $1 ORDER BY created_at, attempt_id",
            SELECT_ATTEMPT
        ))
        .bind(*bill_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        rows.into_iter()
            .map(|row| row.into_attempt().map_err(PortError::from))
            .collect()
    }

    async fn bills_for_store(&self, store_id: StoreId) -> Result<Vec<Bill>, PortError> {
        let rows: Vec<BillRow> = sqlx::query_as(&format!(
            "{} WHERE store_id = $1 ORDER BY created_at, bill_id",
            SELECT_BILL
        ))
        .bind(*store_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        rows.into_iter()
            .map(|row| row.into_bill().map_err(PortError::from))
            .collect()
    }

    async fn bills_modified_since(
        &self,
        store_id: StoreId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Bill>, PortError> {
        let rows: Vec<BillRow> = sqlx::query_as(&format!(
            "{} WHERE store_id = $1 AND updated_at >= $2 ORDER BY updated_at, bill_id",
            SELECT_BILL
        ))
        .bind(*store_id.as_uuid())
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        rows.into_iter()
            .map(|row| row.into_bill().map_err(PortError::from))
            .collect()
    }

    async fn pending_attempts_before(
        &self,
        store_id: StoreId,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<PaymentAttempt>, PortError> {
        let rows: Vec<AttemptRow> = sqlx::query_as(&format!(
            "{} WHERE store_id = $1 AND outcome = 'pending' AND created_at < $2 \
             ORDER BY created_at, attempt_id",
            SELECT_ATTEMPT
        ))
        .bind(*store_id.as_uuid())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        rows.into_iter()
            .map(|row| row.into_attempt().map_err(PortError::from))
            .collect()
    }
}
