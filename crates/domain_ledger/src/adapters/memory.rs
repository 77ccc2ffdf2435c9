//! In-memory port adapters
//!
//! `MemoryLedgerStore` honors the same atomicity contract as the
//! PostgreSQL adapter: one mutex guards both the idempotency-key index and
//! the attempt map, so check and insert are a single critical section, and
//! bill updates compare the stored version before writing. No lock is held
//! across an await point.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{BillId, DomainPort, IdempotencyKey, Money, PaymentAttemptId, PortError, StoreId};
use domain_billing::Bill;

use crate::alerts::{AlertEvent, AlertSink};
use crate::attempt::{PaymentAttempt, PaymentChannel};
use crate::gateway::{GatewayOutcome, PaymentGateway};
use crate::store::{AttemptInsert, LedgerStore};

#[derive(Default)]
struct MemoryState {
    bills: HashMap<BillId, Bill>,
    attempts: HashMap<PaymentAttemptId, PaymentAttempt>,
    /// Idempotency index: `(store, key) -> attempt`
    keys: HashMap<(StoreId, String), PaymentAttemptId>,
}

/// Mutex-backed implementation of [`LedgerStore`]
#[derive(Default)]
pub struct MemoryLedgerStore {
    inner: Mutex<MemoryState>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, PortError> {
        self.inner
            .lock()
            .map_err(|_| PortError::internal("ledger store mutex poisoned"))
    }

    fn stored_copy(bill: &Bill) -> Bill {
        let mut copy = bill.clone();
        // Pending events belong to the caller, not the stored row.
        let _ = copy.take_events();
        copy
    }
}

impl DomainPort for MemoryLedgerStore {}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert_bill(&self, bill: &Bill) -> Result<(), PortError> {
        let mut state = self.lock()?;
        if state.bills.contains_key(&bill.id) {
            return Err(PortError::conflict(format!("bill {} already exists", bill.id)));
        }
        state.bills.insert(bill.id, Self::stored_copy(bill));
        Ok(())
    }

    async fn load_bill(&self, bill_id: BillId) -> Result<Bill, PortError> {
        let state = self.lock()?;
        state
            .bills
            .get(&bill_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Bill", bill_id))
    }

    async fn update_bill(&self, bill: &Bill, expected_version: u32) -> Result<(), PortError> {
        let mut state = self.lock()?;
        let stored = state
            .bills
            .get_mut(&bill.id)
            .ok_or_else(|| PortError::not_found("Bill", bill.id))?;
        if stored.version != expected_version {
            return Err(PortError::conflict(format!(
                "bill {} version is {}, expected {}",
                bill.id, stored.version, expected_version
            )));
        }
        *stored = Self::stored_copy(bill);
        Ok(())
    }

    async fn insert_attempt(&self, attempt: &PaymentAttempt) -> Result<AttemptInsert, PortError> {
        let mut state = self.lock()?;
        let key = (attempt.store_id, attempt.idempotency_key.as_str().to_string());
        if let Some(existing_id) = state.keys.get(&key) {
            let existing = state
                .attempts
                .get(existing_id)
                .cloned()
                .ok_or_else(|| PortError::internal("idempotency index points at missing attempt"))?;
            return Ok(AttemptInsert::Duplicate(existing));
        }
        state.keys.insert(key, attempt.id);
        state.attempts.insert(attempt.id, attempt.clone());
        Ok(AttemptInsert::Inserted)
    }

    async fn load_attempt(&self, attempt_id: PaymentAttemptId) -> Result<PaymentAttempt, PortError> {
        let state = self.lock()?;
        state
            .attempts
            .get(&attempt_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("PaymentAttempt", attempt_id))
    }

    async fn attempt_by_key(
        &self,
        store_id: StoreId,
        key: &IdempotencyKey,
    ) -> Result<Option<PaymentAttempt>, PortError> {
        let state = self.lock()?;
        Ok(state
            .keys
            .get(&(store_id, key.as_str().to_string()))
            .and_then(|id| state.attempts.get(id))
            .cloned())
    }

    async fn finalize_attempt(&self, attempt: &PaymentAttempt) -> Result<(), PortError> {
        let mut state = self.lock()?;
        let stored = state
            .attempts
            .get_mut(&attempt.id)
            .ok_or_else(|| PortError::not_found("PaymentAttempt", attempt.id))?;
        if stored.outcome.is_final() && stored.outcome != attempt.outcome {
            return Err(PortError::conflict(format!(
                "attempt {} already finalized as {}",
                attempt.id, stored.outcome
            )));
        }
        *stored = attempt.clone();
        Ok(())
    }

    async fn attempts_for_bill(&self, bill_id: BillId) -> Result<Vec<PaymentAttempt>, PortError> {
        let state = self.lock()?;
        let mut attempts: Vec<PaymentAttempt> = state
            .attempts
            .values()
            .filter(|a| a.bill_id == bill_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.created_at);
        Ok(attempts)
    }

    async fn bills_for_store(&self, store_id: StoreId) -> Result<Vec<Bill>, PortError> {
        let state = self.lock()?;
        let mut bills: Vec<Bill> = state
            .bills
            .values()
            .filter(|b| b.store_id == store_id)
            .cloned()
            .collect();
        bills.sort_by_key(|b| b.created_at);
        Ok(bills)
    }

    async fn bills_modified_since(
        &self,
        store_id: StoreId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Bill>, PortError> {
        let state = self.lock()?;
        let mut bills: Vec<Bill> = state
            .bills
            .values()
            .filter(|b| b.store_id == store_id && b.updated_at >= since)
            .cloned()
            .collect();
        bills.sort_by_key(|b| b.updated_at);
        Ok(bills)
    }

    async fn pending_attempts_before(
        &self,
        store_id: StoreId,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<PaymentAttempt>, PortError> {
        let state = self.lock()?;
        let mut attempts: Vec<PaymentAttempt> = state
            .attempts
            .values()
            .filter(|a| a.store_id == store_id && a.is_pending() && a.created_at < cutoff)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.created_at);
        Ok(attempts)
    }
}

/// Collects published alerts for inspection in tests
#[derive(Default)]
pub struct CapturingAlertSink {
    published: Mutex<Vec<AlertEvent>>,
}

impl CapturingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<AlertEvent> {
        self.published
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl DomainPort for CapturingAlertSink {}

#[async_trait]
impl AlertSink for CapturingAlertSink {
    async fn publish(&self, event: AlertEvent) -> Result<(), PortError> {
        self.published
            .lock()
            .map_err(|_| PortError::internal("alert sink mutex poisoned"))?
            .push(event);
        Ok(())
    }
}

/// One scripted gateway response
pub struct ScriptedResponse {
    result: Result<GatewayOutcome, PortError>,
    delay: Option<std::time::Duration>,
}

/// Gateway that replays a queue of scripted responses
///
/// An empty queue settles every charge, so the happy path needs no setup.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<ScriptedResponse>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway that settles everything immediately
    pub fn always_settles() -> Self {
        Self::default()
    }

    pub fn push(&self, result: Result<GatewayOutcome, PortError>) {
        self.push_delayed(result, None);
    }

    /// Queues a response delivered only after the given delay, for
    /// exercising submission timeouts
    pub fn push_delayed(
        &self,
        result: Result<GatewayOutcome, PortError>,
        delay: Option<std::time::Duration>,
    ) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(ScriptedResponse { result, delay });
        }
    }
}

impl DomainPort for ScriptedGateway {}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn attempt_charge(
        &self,
        _amount: Money,
        _channel: PaymentChannel,
        _reference: PaymentAttemptId,
    ) -> Result<GatewayOutcome, PortError> {
        let next = self
            .script
            .lock()
            .map_err(|_| PortError::internal("gateway mutex poisoned"))?
            .pop_front();

        match next {
            Some(ScriptedResponse { result, delay }) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            None => Ok(GatewayOutcome::Settled),
        }
    }
}
