//! Scope-enforcing facade over the payment ledger
//!
//! `ScopedLedger` is the only surface outer layers call. Each operation
//! authorizes the scope first (tenant active, store active, store belongs
//! to tenant), then verifies the targeted bill or attempt belongs to the
//! scoped store, and only then delegates to the ledger. Violations never
//! partially execute.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{instrument, warn};

use core_kernel::{BillId, CustomerId, IdempotencyKey, Money, PaymentAttemptId};
use domain_billing::Bill;
use domain_ledger::{
    GatewayOutcome, LedgerStore, PaymentChannel, PaymentLedger, ReconcileOutcome,
    ReconciliationEngine, StoreSummary, SubmitReceipt, SweepReport,
};

use crate::directory::{Store, StoreDirectory};
use crate::error::TenancyError;
use crate::scope::ScopeContext;

/// Tenant- and store-scoped entry point for all ledger operations
pub struct ScopedLedger {
    directory: Arc<dyn StoreDirectory>,
    store: Arc<dyn LedgerStore>,
    ledger: Arc<PaymentLedger>,
    engine: Arc<ReconciliationEngine>,
}

impl ScopedLedger {
    pub fn new(
        directory: Arc<dyn StoreDirectory>,
        store: Arc<dyn LedgerStore>,
        ledger: Arc<PaymentLedger>,
        engine: Arc<ReconciliationEngine>,
    ) -> Self {
        Self {
            directory,
            store,
            ledger,
            engine,
        }
    }

    /// Resolves the scope and rejects anything out of bounds
    ///
    /// An unknown store is reported as a scope violation rather than a
    /// not-found, so callers cannot probe for stores outside their tenant.
    async fn authorize(&self, ctx: &ScopeContext) -> Result<Store, TenancyError> {
        let store = match self.directory.load_store(ctx.store_id).await {
            Ok(store) => store,
            Err(err) if err.is_not_found() => {
                warn!(store_id = %ctx.store_id, "scope check against unknown store");
                return Err(TenancyError::scope_violation(format!(
                    "store {} is not accessible to tenant {}",
                    ctx.store_id, ctx.tenant_id
                )));
            }
            Err(err) => return Err(err.into()),
        };

        if store.tenant_id != ctx.tenant_id {
            warn!(
                store_id = %ctx.store_id,
                claimed = %ctx.tenant_id,
                actual = %store.tenant_id,
                "cross-tenant store access rejected"
            );
            return Err(TenancyError::scope_violation(format!(
                "store {} is not accessible to tenant {}",
                ctx.store_id, ctx.tenant_id
            )));
        }

        let tenant = self.directory.load_tenant(ctx.tenant_id).await?;
        if !tenant.is_active {
            return Err(TenancyError::TenantInactive {
                tenant_id: ctx.tenant_id,
            });
        }
        if !store.is_active {
            return Err(TenancyError::StoreInactive {
                store_id: ctx.store_id,
            });
        }

        Ok(store)
    }

    /// Verifies the bill belongs to the scoped store
    async fn owned_bill(&self, ctx: &ScopeContext, bill_id: BillId) -> Result<Bill, TenancyError> {
        let bill = self.store.load_bill(bill_id).await?;
        if bill.store_id != ctx.store_id {
            warn!(%bill_id, store_id = %ctx.store_id, "cross-store bill access rejected");
            return Err(TenancyError::scope_violation(format!(
                "bill {} does not belong to store {}",
                bill_id, ctx.store_id
            )));
        }
        Ok(bill)
    }

    /// Verifies the attempt belongs to the scoped store
    async fn owned_attempt(
        &self,
        ctx: &ScopeContext,
        attempt_id: PaymentAttemptId,
    ) -> Result<(), TenancyError> {
        let attempt = self.store.load_attempt(attempt_id).await?;
        if attempt.store_id != ctx.store_id {
            warn!(%attempt_id, store_id = %ctx.store_id, "cross-store attempt access rejected");
            return Err(TenancyError::scope_violation(format!(
                "attempt {} does not belong to store {}",
                attempt_id, ctx.store_id
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(store_id = %ctx.store_id))]
    pub async fn create_bill(
        &self,
        ctx: &ScopeContext,
        customer_id: CustomerId,
        total: Money,
    ) -> Result<Bill, TenancyError> {
        self.authorize(ctx).await?;
        Ok(self.ledger.create_bill(ctx.store_id, customer_id, total).await?)
    }

    #[instrument(skip(self, ctx), fields(store_id = %ctx.store_id, %bill_id))]
    pub async fn open_bill(
        &self,
        ctx: &ScopeContext,
        bill_id: BillId,
        expected_version: u32,
    ) -> Result<Bill, TenancyError> {
        self.authorize(ctx).await?;
        self.owned_bill(ctx, bill_id).await?;
        Ok(self.ledger.open_bill(bill_id, expected_version).await?)
    }

    #[instrument(skip(self, ctx, reason), fields(store_id = %ctx.store_id, %bill_id))]
    pub async fn void_bill(
        &self,
        ctx: &ScopeContext,
        bill_id: BillId,
        expected_version: u32,
        reason: impl Into<String> + std::fmt::Debug,
    ) -> Result<Bill, TenancyError> {
        self.authorize(ctx).await?;
        self.owned_bill(ctx, bill_id).await?;
        Ok(self.ledger.void_bill(bill_id, expected_version, reason).await?)
    }

    #[instrument(skip(self, ctx, idempotency_key), fields(store_id = %ctx.store_id, %bill_id))]
    pub async fn submit_payment(
        &self,
        ctx: &ScopeContext,
        bill_id: BillId,
        amount: Money,
        channel: PaymentChannel,
        idempotency_key: IdempotencyKey,
    ) -> Result<SubmitReceipt, TenancyError> {
        self.authorize(ctx).await?;
        self.owned_bill(ctx, bill_id).await?;
        Ok(self
            .ledger
            .submit(bill_id, amount, channel, idempotency_key)
            .await?)
    }

    #[instrument(skip(self, ctx), fields(store_id = %ctx.store_id, %attempt_id))]
    pub async fn confirm_payment(
        &self,
        ctx: &ScopeContext,
        attempt_id: PaymentAttemptId,
        outcome: GatewayOutcome,
    ) -> Result<SubmitReceipt, TenancyError> {
        self.authorize(ctx).await?;
        self.owned_attempt(ctx, attempt_id).await?;
        Ok(self.ledger.confirm(attempt_id, outcome).await?)
    }

    #[instrument(skip(self, ctx, reason), fields(store_id = %ctx.store_id, %attempt_id))]
    pub async fn reverse_payment(
        &self,
        ctx: &ScopeContext,
        attempt_id: PaymentAttemptId,
        reason: impl Into<String> + std::fmt::Debug,
    ) -> Result<SubmitReceipt, TenancyError> {
        self.authorize(ctx).await?;
        self.owned_attempt(ctx, attempt_id).await?;
        Ok(self.ledger.reverse(attempt_id, reason).await?)
    }

    #[instrument(skip(self, ctx), fields(store_id = %ctx.store_id, %bill_id))]
    pub async fn reconcile_bill(
        &self,
        ctx: &ScopeContext,
        bill_id: BillId,
    ) -> Result<ReconcileOutcome, TenancyError> {
        self.authorize(ctx).await?;
        self.owned_bill(ctx, bill_id).await?;
        Ok(self.engine.reconcile_bill(bill_id).await?)
    }

    #[instrument(skip(self, ctx), fields(store_id = %ctx.store_id))]
    pub async fn sweep(
        &self,
        ctx: &ScopeContext,
        since: DateTime<Utc>,
    ) -> Result<SweepReport, TenancyError> {
        self.authorize(ctx).await?;
        Ok(self.engine.sweep(ctx.store_id, since).await?)
    }

    #[instrument(skip(self, ctx), fields(store_id = %ctx.store_id))]
    pub async fn store_summary(&self, ctx: &ScopeContext) -> Result<StoreSummary, TenancyError> {
        self.authorize(ctx).await?;
        Ok(self.ledger.store_summary(ctx.store_id).await?)
    }

    /// Summaries for every store of the scoped tenant
    ///
    /// Tenant-level reporting; each store is still checked to belong to
    /// the caller's tenant by construction of the directory query.
    pub async fn tenant_summaries(
        &self,
        ctx: &ScopeContext,
    ) -> Result<Vec<StoreSummary>, TenancyError> {
        self.authorize(ctx).await?;
        let mut summaries = Vec::new();
        for store in self.directory.stores_for_tenant(ctx.tenant_id).await? {
            summaries.push(self.ledger.store_summary(store.id).await?);
        }
        Ok(summaries)
    }
}

