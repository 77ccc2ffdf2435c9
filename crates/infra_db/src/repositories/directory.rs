//! PostgreSQL implementation of the tenant/store directory port

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use core_kernel::{DomainPort, PortError, StoreId, TenantId};
use domain_tenancy::{Store, StoreDirectory, Tenant};

use crate::error::DatabaseError;

/// Repository for tenants and their stores
#[derive(Debug, Clone)]
pub struct PostgresStoreDirectory {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct TenantRow {
    tenant_id: Uuid,
    name: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Tenant {
            id: TenantId::from_uuid(row.tenant_id),
            name: row.name,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StoreRow {
    store_id: Uuid,
    tenant_id: Uuid,
    name: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<StoreRow> for Store {
    fn from(row: StoreRow) -> Self {
        Store {
            id: StoreId::from_uuid(row.store_id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            name: row.name,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

impl PostgresStoreDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PostgresStoreDirectory {}

#[async_trait]
impl StoreDirectory for PostgresStoreDirectory {
    async fn register_tenant(&self, tenant: &Tenant) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO tenants (tenant_id, name, is_active, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(*tenant.id.as_uuid())
        .bind(&tenant.name)
        .bind(tenant.is_active)
        .bind(tenant.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;
        Ok(())
    }

    async fn register_store(&self, store: &Store) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO stores (store_id, tenant_id, name, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(*store.id.as_uuid())
        .bind(*store.tenant_id.as_uuid())
        .bind(&store.name)
        .bind(store.is_active)
        .bind(store.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;
        Ok(())
    }

    async fn load_tenant(&self, tenant_id: TenantId) -> Result<Tenant, PortError> {
        let row: Option<TenantRow> = sqlx::query_as(
            "SELECT tenant_id, name, is_active, created_at FROM tenants WHERE tenant_id = $1",
        )
        .bind(*tenant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        row.map(Tenant::from)
            .ok_or_else(|| PortError::not_found("Tenant", tenant_id))
    }

    async fn load_store(&self, store_id: StoreId) -> Result<Store, PortError> {
        let row: Option<StoreRow> = sqlx::query_as(
            "SELECT store_id, tenant_id, name, is_active, created_at FROM stores \
             WHERE store_id = $1",
        )
        .bind(*store_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        row.map(Store::from)
            .ok_or_else(|| PortError::not_found("Store", store_id))
    }

    async fn stores_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<Store>, PortError> {
        let rows: Vec<StoreRow> = sqlx::query_as(
            "SELECT store_id, tenant_id, name, is_active, created_at FROM stores \
             WHERE tenant_id = $1 ORDER BY created_at, store_id",
        )
        .bind(*tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::from(&e))?;

        Ok(rows.into_iter().map(Store::from).collect())
    }

    async fn set_store_active(&self, store_id: StoreId, active: bool) -> Result<(), PortError> {
        let result = sqlx::query("UPDATE stores SET is_active = $1 WHERE store_id = $2")
            .bind(active)
            .bind(*store_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from(&e))?;

        if result.rows_affected() == 0 {
            return Err(PortError::not_found("Store", store_id));
        }
        Ok(())
    }
}
