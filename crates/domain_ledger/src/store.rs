//! Storage port for bills and payment attempts
//!
//! The ledger core never talks to a database directly; it goes through
//! `LedgerStore`. Implementations must provide two atomicity guarantees:
//!
//! - [`LedgerStore::insert_attempt`] is single-writer-wins on
//!   `(store, idempotency key)`: of two concurrent inserts with the same
//!   key, exactly one creates a record and the other receives the winner's
//!   record back. In PostgreSQL this is a unique constraint; the in-memory
//!   adapter holds one lock across check and insert.
//! - [`LedgerStore::update_bill`] is compare-and-swap on the bill version:
//!   the write succeeds only if the stored version still equals
//!   `expected_version`, otherwise it fails with `PortError::Conflict` and
//!   the caller re-reads.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{BillId, DomainPort, IdempotencyKey, PaymentAttemptId, PortError, StoreId};
use domain_billing::Bill;

use crate::attempt::PaymentAttempt;

/// Result of an idempotent attempt insert
#[derive(Debug, Clone)]
pub enum AttemptInsert {
    /// The attempt was recorded; this caller is the writer
    Inserted,
    /// Another attempt with the same `(store, idempotency key)` already
    /// exists; the existing record is returned unchanged
    Duplicate(PaymentAttempt),
}

/// Storage port for the payment ledger
#[async_trait]
pub trait LedgerStore: DomainPort {
    /// Persists a newly created bill
    async fn insert_bill(&self, bill: &Bill) -> Result<(), PortError>;

    /// Loads a bill by id
    async fn load_bill(&self, bill_id: BillId) -> Result<Bill, PortError>;

    /// Compare-and-swap update of a bill
    ///
    /// `expected_version` is the version the caller read before mutating.
    /// Fails with `PortError::Conflict` when another writer got there first;
    /// the bill is left unchanged in that case.
    async fn update_bill(&self, bill: &Bill, expected_version: u32) -> Result<(), PortError>;

    /// Atomically inserts a payment attempt, enforcing idempotency-key
    /// uniqueness within the attempt's store
    async fn insert_attempt(&self, attempt: &PaymentAttempt) -> Result<AttemptInsert, PortError>;

    /// Loads an attempt by id
    async fn load_attempt(&self, attempt_id: PaymentAttemptId) -> Result<PaymentAttempt, PortError>;

    /// Looks up an attempt by its idempotency key within a store
    ///
    /// Resubmissions consult this before any bill-state check, so a
    /// replayed key observes the recorded outcome even after the bill has
    /// left a payable state.
    async fn attempt_by_key(
        &self,
        store_id: StoreId,
        key: &IdempotencyKey,
    ) -> Result<Option<PaymentAttempt>, PortError>;

    /// Persists the final outcome of a previously pending attempt
    ///
    /// Implementations must only move records out of `pending`; final
    /// outcomes are immutable.
    async fn finalize_attempt(&self, attempt: &PaymentAttempt) -> Result<(), PortError>;

    /// All attempts recorded against a bill, in creation order
    async fn attempts_for_bill(&self, bill_id: BillId) -> Result<Vec<PaymentAttempt>, PortError>;

    /// All bills belonging to a store
    async fn bills_for_store(&self, store_id: StoreId) -> Result<Vec<Bill>, PortError>;

    /// Bills of a store modified at or after the given checkpoint
    async fn bills_modified_since(
        &self,
        store_id: StoreId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Bill>, PortError>;

    /// Pending attempts of a store created before the cutoff
    async fn pending_attempts_before(
        &self,
        store_id: StoreId,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<PaymentAttempt>, PortError>;
}
