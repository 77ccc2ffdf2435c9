//! In-memory directory adapter

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use core_kernel::{DomainPort, PortError, StoreId, TenantId};

use crate::directory::{Store, StoreDirectory, Tenant};

#[derive(Default)]
struct DirectoryState {
    tenants: HashMap<TenantId, Tenant>,
    stores: HashMap<StoreId, Store>,
}

/// Mutex-backed implementation of [`StoreDirectory`]
#[derive(Default)]
pub struct MemoryDirectory {
    inner: Mutex<DirectoryState>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, DirectoryState>, PortError> {
        self.inner
            .lock()
            .map_err(|_| PortError::internal("directory mutex poisoned"))
    }
}

impl DomainPort for MemoryDirectory {}

#[async_trait]
impl StoreDirectory for MemoryDirectory {
    async fn register_tenant(&self, tenant: &Tenant) -> Result<(), PortError> {
        let mut state = self.lock()?;
        if state.tenants.contains_key(&tenant.id) {
            return Err(PortError::conflict(format!(
                "tenant {} already exists",
                tenant.id
            )));
        }
        state.tenants.insert(tenant.id, tenant.clone());
        Ok(())
    }

    async fn register_store(&self, store: &Store) -> Result<(), PortError> {
        let mut state = self.lock()?;
        if !state.tenants.contains_key(&store.tenant_id) {
            return Err(PortError::not_found("Tenant", store.tenant_id));
        }
        if state.stores.contains_key(&store.id) {
            return Err(PortError::conflict(format!(
                "store {} already exists",
                store.id
            )));
        }
        state.stores.insert(store.id, store.clone());
        Ok(())
    }

    async fn load_tenant(&self, tenant_id: TenantId) -> Result<Tenant, PortError> {
        let state = self.lock()?;
        state
            .tenants
            .get(&tenant_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Tenant", tenant_id))
    }

    async fn load_store(&self, store_id: StoreId) -> Result<Store, PortError> {
        let state = self.lock()?;
        state
            .stores
            .get(&store_id)
            .cloned()
            .ok_or_else(|| PortError::not_found("Store", store_id))
    }

    async fn stores_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<Store>, PortError> {
        let state = self.lock()?;
        let mut stores: Vec<Store> = state
            .stores
            .values()
            .filter(|s| s.tenant_id == tenant_id)
            .cloned()
            .collect();
        stores.sort_by_key(|s| s.created_at);
        Ok(stores)
    }

    async fn set_store_active(&self, store_id: StoreId, active: bool) -> Result<(), PortError> {
        let mut state = self.lock()?;
        let store = state
            .stores
            .get_mut(&store_id)
            .ok_or_else(|| PortError::not_found("Store", store_id))?;
        store.is_active = active;
        Ok(())
    }
}
