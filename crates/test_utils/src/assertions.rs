//! Custom Test Assertions
//!
//! Assertion helpers for domain types that give more meaningful error
//! messages than standard assertions.

use core_kernel::Money;
use domain_billing::{Bill, BillState};
use rust_decimal::Decimal;

/// Asserts that two Money values are equal within a tolerance
///
/// # Panics
///
/// Panics if the currencies don't match or the amounts differ by more
/// than the tolerance
pub fn assert_money_approx_eq(actual: &Money, expected: &Money, tolerance: Decimal) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );

    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "Money amounts differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual.amount(),
        expected.amount(),
        diff,
        tolerance
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(
        money.is_zero(),
        "Expected zero money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts that a bill is in the expected lifecycle state
pub fn assert_bill_state(bill: &Bill, expected: &BillState) {
    assert_eq!(
        &bill.state,
        expected,
        "Bill {} is in state {}, expected {}",
        bill.id,
        bill.state.name(),
        expected.name()
    );
}

/// Asserts that a bill's recorded position matches the given settled total
pub fn assert_bill_settled(bill: &Bill, settled: &Money) {
    assert_eq!(
        &bill.paid_to_date, settled,
        "Bill {} records paid_to_date {}, expected {}",
        bill.id, bill.paid_to_date, settled
    );
}
