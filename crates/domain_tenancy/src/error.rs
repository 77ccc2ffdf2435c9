//! Tenancy error types

use thiserror::Error;

use core_kernel::{PortError, StoreId, TenantId};
use domain_ledger::LedgerError;

#[derive(Debug, Error)]
pub enum TenancyError {
    /// The caller tried to reach data outside its tenant or store. Always
    /// fatal to the request; nothing executed before the check.
    #[error("scope violation: {detail}")]
    ScopeViolation { detail: String },

    #[error("store {store_id} is deactivated")]
    StoreInactive { store_id: StoreId },

    #[error("tenant {tenant_id} is deactivated")]
    TenantInactive { tenant_id: TenantId },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Port(#[from] PortError),
}

impl TenancyError {
    pub fn scope_violation(detail: impl Into<String>) -> Self {
        TenancyError::ScopeViolation {
            detail: detail.into(),
        }
    }

    pub fn is_scope_violation(&self) -> bool {
        matches!(self, TenancyError::ScopeViolation { .. })
    }
}
