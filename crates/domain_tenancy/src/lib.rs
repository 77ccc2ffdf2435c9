//! Tenancy Domain - tenant/store directory and request scoping
//!
//! Every operation that reaches the billing and ledger domains first passes
//! through [`ScopedLedger`], which resolves the caller's tenant and store,
//! rejects cross-tenant and cross-store access, and only then delegates.
//! A scope violation is always fatal to the request; nothing executes
//! before the check passes.

pub mod adapters;
pub mod directory;
pub mod error;
pub mod scope;
pub mod scoped;

pub use directory::{Store, StoreDirectory, Tenant};
pub use error::TenancyError;
pub use scope::ScopeContext;
pub use scoped::ScopedLedger;
