//! Tenants, stores, and the directory port

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{DomainPort, PortError, StoreId, TenantId};

/// A paying platform customer owning one or more stores
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    /// Deactivated tenants keep their data but accept no operations
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TenantId::new(),
            name: name.into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

/// A physical laundry store belonging to a tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub tenant_id: TenantId,
    pub name: String,
    /// Deactivated stores keep their ledger but accept no operations
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Store {
    pub fn new(tenant_id: TenantId, name: impl Into<String>) -> Self {
        Self {
            id: StoreId::new(),
            tenant_id,
            name: name.into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

/// Port for resolving tenants and stores
#[async_trait]
pub trait StoreDirectory: DomainPort {
    async fn register_tenant(&self, tenant: &Tenant) -> Result<(), PortError>;

    async fn register_store(&self, store: &Store) -> Result<(), PortError>;

    async fn load_tenant(&self, tenant_id: TenantId) -> Result<Tenant, PortError>;

    async fn load_store(&self, store_id: StoreId) -> Result<Store, PortError>;

    async fn stores_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<Store>, PortError>;

    /// Flips a store's active flag
    async fn set_store_active(&self, store_id: StoreId, active: bool) -> Result<(), PortError>;
}
