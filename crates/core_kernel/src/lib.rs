//! Core Kernel - Foundational types for the laundry billing ledger
//!
//! This crate provides the building blocks shared by all domain modules:
//! - Money types with precise decimal arithmetic
//! - Strongly-typed identifiers for tenants, stores, bills, and payments
//! - Idempotency keys for exactly-once payment submission
//! - Port abstractions for storage and external collaborators

pub mod error;
pub mod identifiers;
pub mod idempotency;
pub mod money;
pub mod ports;

pub use error::CoreError;
pub use idempotency::{IdempotencyKey, IdempotencyKeyError};
pub use identifiers::{
    AlertId, BillId, CustomerId, PaymentAttemptId, StoreId, TenantId,
};
pub use money::{Currency, Money, MoneyError};
pub use ports::{DomainPort, PortError};
