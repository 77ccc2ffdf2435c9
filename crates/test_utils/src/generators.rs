//! Property-Based Test Generators
//!
//! Proptest strategies for generating random test data that maintains
//! domain invariants.

use core_kernel::{Currency, IdempotencyKey, Money};
use domain_ledger::PaymentChannel;
use proptest::prelude::*;

/// Strategy for generating valid Currency values
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::Inr),
        Just(Currency::Usd),
        Just(Currency::Aed),
        Just(Currency::Sgd),
    ]
}

/// Strategy for generating payment channels
pub fn channel_strategy() -> impl Strategy<Value = PaymentChannel> {
    prop_oneof![
        Just(PaymentChannel::Cash),
        Just(PaymentChannel::Upi),
        Just(PaymentChannel::Wallet),
        Just(PaymentChannel::Card),
    ]
}

/// Strategy for positive amounts in minor units (paise)
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..100_000_000i64
}

/// Strategy for positive INR Money values
pub fn inr_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(|minor| Money::from_minor(minor, Currency::Inr))
}

/// Strategy for positive Money values in any supported currency
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (positive_amount_minor_strategy(), currency_strategy())
        .prop_map(|(minor, currency)| Money::from_minor(minor, currency))
}

/// Strategy for well-formed idempotency keys
pub fn idempotency_key_strategy() -> impl Strategy<Value = IdempotencyKey> {
    "[a-zA-Z0-9_-]{1,64}".prop_map(|raw| IdempotencyKey::new(raw).expect("generated key is valid"))
}
