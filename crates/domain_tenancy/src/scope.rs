//! Request scope

use serde::{Deserialize, Serialize};

use core_kernel::{StoreId, TenantId};

/// The tenant and store a request acts on behalf of
///
/// Built by the outer layer (API authentication) and threaded through every
/// call into [`crate::ScopedLedger`]. The scope names what the caller may
/// touch; the facade verifies that every entity reached actually belongs to
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeContext {
    pub tenant_id: TenantId,
    pub store_id: StoreId,
}

impl ScopeContext {
    pub fn new(tenant_id: TenantId, store_id: StoreId) -> Self {
        Self {
            tenant_id,
            store_id,
        }
    }
}
