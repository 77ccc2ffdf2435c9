//! Infrastructure Database Layer
//!
//! PostgreSQL-backed implementations of the domain storage ports, built on
//! SQLx. The repositories hide the schema from the domains; everything
//! crossing the boundary is a domain type.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{DatabaseConfig, create_pool, run_migrations, PostgresLedgerStore};
//!
//! let pool = create_pool(DatabaseConfig::new(&url)).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresLedgerStore::new(pool);
//! ```

pub mod error;
pub mod pool;
pub mod repositories;

pub use error::DatabaseError;
pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
pub use repositories::{PostgresLedgerStore, PostgresStoreDirectory};
