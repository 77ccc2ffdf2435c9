//! Payment gateway port

use async_trait::async_trait;

use core_kernel::{DomainPort, Money, PaymentAttemptId, PortError};

use crate::attempt::PaymentChannel;

/// Outcome reported by a payment gateway for a charge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    /// Funds were captured
    Settled,
    /// The charge was declined; the reason is carried verbatim
    Failed(String),
    /// The gateway accepted the charge but has not resolved it yet;
    /// the attempt stays pending until a later confirmation or sweep
    Pending,
}

/// Port to an external payment processor
///
/// A returned `Err` means the gateway could not be reached at all; the
/// attempt is left pending in that case, same as [`GatewayOutcome::Pending`].
#[async_trait]
pub trait PaymentGateway: DomainPort {
    async fn attempt_charge(
        &self,
        amount: Money,
        channel: PaymentChannel,
        reference: PaymentAttemptId,
    ) -> Result<GatewayOutcome, PortError>;
}
