//! Ledger policy configuration
//!
//! All thresholds the ledger applies at runtime live here so operators can
//! tune them per deployment. Values load from `LEDGER_*` environment
//! variables, falling back to the defaults below.

use chrono::Duration;
use config::{Config, Environment};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{CoreError, Currency, Money};

/// Tunable thresholds applied by the ledger and reconciliation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerPolicy {
    /// Currency every bill and attempt is denominated in
    pub currency: Currency,
    /// Collected amount may exceed the bill total by at most this much
    /// before an overpayment alert fires
    pub overpayment_tolerance: Decimal,
    /// Collected totals at or above this amount flag the bill high-value
    pub high_value_threshold: Decimal,
    /// Pending attempts older than this are failed by the sweep
    pub pending_timeout_secs: u64,
    /// How long a synchronous gateway call may take before the submission
    /// returns a timeout and leaves the attempt pending
    pub gateway_timeout_ms: u64,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            currency: Currency::Inr,
            overpayment_tolerance: dec!(1.00),
            high_value_threshold: dec!(10000.00),
            pending_timeout_secs: 1800,
            gateway_timeout_ms: 10_000,
        }
    }
}

impl LedgerPolicy {
    /// Loads policy from `LEDGER_*` environment variables
    ///
    /// Unset variables keep their defaults, e.g.
    /// `LEDGER_HIGH_VALUE_THRESHOLD=25000.00` raises only the high-value
    /// threshold.
    pub fn from_env() -> Result<Self, CoreError> {
        let cfg = Config::builder()
            .add_source(Environment::with_prefix("LEDGER"))
            .build()
            .map_err(|e| CoreError::Configuration(e.to_string()))?;
        cfg.try_deserialize()
            .map_err(|e| CoreError::Configuration(e.to_string()))
    }

    /// Overpayment tolerance as money in the policy currency
    pub fn tolerance(&self) -> Money {
        Money::new(self.overpayment_tolerance, self.currency)
    }

    /// High-value threshold as money in the policy currency
    pub fn threshold(&self) -> Money {
        Money::new(self.high_value_threshold, self.currency)
    }

    /// Window after which a pending attempt is considered abandoned
    pub fn pending_window(&self) -> Duration {
        Duration::seconds(self.pending_timeout_secs as i64)
    }

    /// Budget for a synchronous gateway round trip
    pub fn gateway_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.gateway_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let policy = LedgerPolicy::default();
        assert_eq!(policy.currency, Currency::Inr);
        assert_eq!(policy.overpayment_tolerance, dec!(1.00));
        assert_eq!(policy.high_value_threshold, dec!(10000.00));
        assert_eq!(policy.pending_window(), Duration::minutes(30));
        assert_eq!(
            policy.gateway_timeout(),
            std::time::Duration::from_secs(10)
        );
    }

    #[test]
    fn tolerance_carries_policy_currency() {
        let policy = LedgerPolicy::default();
        assert_eq!(policy.tolerance().currency(), Currency::Inr);
        assert_eq!(policy.threshold().amount(), dec!(10000.00));
    }
}
