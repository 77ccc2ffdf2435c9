//! Pre-built Test Fixtures
//!
//! Ready-to-use test data for common entities across the billing ledger.
//! Fixtures are consistent and predictable so unit tests can assert on
//! exact values.

use chrono::{DateTime, TimeZone, Utc};
use core_kernel::{Currency, IdempotencyKey, Money};
use fake::faker::address::en::CityName;
use fake::faker::company::en::CompanyName;
use fake::Fake;
use rust_decimal_macros::dec;

use domain_tenancy::{Store, Tenant};

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// A standard bill total
    pub fn inr_1000() -> Money {
        Money::new(dec!(1000.00), Currency::Inr)
    }

    /// A typical partial payment
    pub fn inr_400() -> Money {
        Money::new(dec!(400.00), Currency::Inr)
    }

    /// An amount past the default high-value threshold
    pub fn inr_high_value() -> Money {
        Money::new(dec!(12000.00), Currency::Inr)
    }

    /// Zero rupees
    pub fn inr_zero() -> Money {
        Money::zero(Currency::Inr)
    }

    /// A USD amount for currency mismatch tests
    pub fn usd_100() -> Money {
        Money::new(dec!(100.00), Currency::Usd)
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// A fixed reference instant for deterministic assertions
    pub fn reference_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    /// A checkpoint safely before any test data
    pub fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
    }

    /// An instant past the default pending window
    pub fn past_pending_window() -> DateTime<Utc> {
        Utc::now() - chrono::Duration::hours(1)
    }
}

/// Fixture for tenancy entities
pub struct TenancyFixtures;

impl TenancyFixtures {
    /// A tenant with one active store
    pub fn tenant_with_store() -> (Tenant, Store) {
        let tenant = Tenant::new("Quick Wash Holdings");
        let store = Store::new(tenant.id, "MG Road");
        (tenant, store)
    }

    /// A second store under the same tenant
    pub fn sibling_store(tenant: &Tenant) -> Store {
        Store::new(tenant.id, "Koramangala")
    }

    /// A tenant with a randomized name, for bulk test data
    pub fn random_tenant() -> Tenant {
        Tenant::new(CompanyName().fake::<String>())
    }

    /// A store with a randomized name under the given tenant
    pub fn random_store(tenant: &Tenant) -> Store {
        Store::new(tenant.id, CityName().fake::<String>())
    }
}

/// Fixture for idempotency keys
pub struct KeyFixtures;

impl KeyFixtures {
    pub fn key(raw: &str) -> IdempotencyKey {
        IdempotencyKey::new(raw).expect("fixture key must be valid")
    }

    /// A unique key per call, for tests that submit repeatedly
    pub fn unique() -> IdempotencyKey {
        IdempotencyKey::new(format!("test-{}", uuid::Uuid::new_v4()))
            .expect("generated key must be valid")
    }
}
