//! Test Data Builders
//!
//! Builder patterns for constructing test data with sensible defaults.
//! Tests specify only the relevant fields and take defaults for the rest.

use core_kernel::{BillId, Currency, CustomerId, IdempotencyKey, Money, StoreId};
use domain_billing::Bill;
use domain_ledger::{PaymentAttempt, PaymentChannel};
use rust_decimal_macros::dec;

use crate::fixtures::KeyFixtures;

/// Builder for bills in a chosen lifecycle position
pub struct TestBillBuilder {
    store_id: StoreId,
    customer_id: CustomerId,
    total: Money,
    opened: bool,
}

impl Default for TestBillBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestBillBuilder {
    pub fn new() -> Self {
        Self {
            store_id: StoreId::new(),
            customer_id: CustomerId::new(),
            total: Money::new(dec!(1000.00), Currency::Inr),
            opened: true,
        }
    }

    pub fn with_store(mut self, store_id: StoreId) -> Self {
        self.store_id = store_id;
        self
    }

    pub fn with_customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = customer_id;
        self
    }

    pub fn with_total(mut self, total: Money) -> Self {
        self.total = total;
        self
    }

    /// Leaves the bill in `Draft` instead of opening it
    pub fn draft(mut self) -> Self {
        self.opened = false;
        self
    }

    pub fn build(self) -> Bill {
        let mut bill =
            Bill::create(self.store_id, self.customer_id, self.total).expect("valid test bill");
        if self.opened {
            bill.open().expect("draft bill opens");
        }
        let _ = bill.take_events();
        bill
    }
}

/// Builder for payment attempts
pub struct TestAttemptBuilder {
    bill_id: BillId,
    store_id: StoreId,
    amount: Money,
    channel: PaymentChannel,
    key: IdempotencyKey,
}

impl TestAttemptBuilder {
    pub fn for_bill(bill: &Bill) -> Self {
        Self {
            bill_id: bill.id,
            store_id: bill.store_id,
            amount: bill.total,
            channel: PaymentChannel::Upi,
            key: KeyFixtures::unique(),
        }
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_channel(mut self, channel: PaymentChannel) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_key(mut self, key: IdempotencyKey) -> Self {
        self.key = key;
        self
    }

    /// A pending charge
    pub fn build(self) -> PaymentAttempt {
        PaymentAttempt::charge(self.bill_id, self.store_id, self.amount, self.channel, self.key)
            .expect("valid test attempt")
    }

    /// A charge already settled
    pub fn build_settled(self) -> PaymentAttempt {
        let mut attempt = self.build();
        attempt.mark_settled().expect("pending attempt settles");
        attempt
    }
}
