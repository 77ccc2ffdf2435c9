//! Integration tests for identifiers and idempotency keys

use core_kernel::{BillId, IdempotencyKey, PaymentAttemptId, StoreId, TenantId};

#[test]
fn ids_are_distinct_types_with_prefixes() {
    assert_eq!(TenantId::prefix(), "TNT");
    assert_eq!(StoreId::prefix(), "STR");
    assert_eq!(BillId::prefix(), "BIL");
    assert_eq!(PaymentAttemptId::prefix(), "PAT");
}

#[test]
fn v7_ids_are_time_ordered() {
    let first = BillId::new_v7();
    let second = BillId::new_v7();
    assert!(first.as_uuid() <= second.as_uuid());
}

#[test]
fn display_round_trips_through_from_str() {
    let id = PaymentAttemptId::new();
    let parsed: PaymentAttemptId = id.to_string().parse().unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn idempotency_key_equality_is_by_value() {
    let a = IdempotencyKey::new("upi-txn-991").unwrap();
    let b = IdempotencyKey::new("upi-txn-991").unwrap();
    assert_eq!(a, b);

    let c = IdempotencyKey::new("upi-txn-992").unwrap();
    assert_ne!(a, c);
}
