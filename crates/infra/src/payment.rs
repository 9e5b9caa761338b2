//! Payment gateway port.
//!
//! The checkout service authorizes exactly the server-computed total through
//! this seam. The fake implementation stands in for the real processor in
//! tests and development.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use ffmarket_core::Amount;

/// An authorized (but not yet captured) payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub amount: Amount,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway rejected the request: {0}")]
    Rejected(String),

    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for exactly `amount`.
    async fn create_intent(&self, amount: Amount) -> Result<PaymentIntent, GatewayError>;
}

/// Deterministic in-process gateway for tests and development.
#[derive(Debug, Default)]
pub struct FakePaymentGateway {
    counter: AtomicU64,
}

impl FakePaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentGateway for FakePaymentGateway {
    async fn create_intent(&self, amount: Amount) -> Result<PaymentIntent, GatewayError> {
        if amount <= Amount::ZERO {
            return Err(GatewayError::Rejected("amount must be positive".to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(PaymentIntent {
            id: format!("pi_fake_{n}"),
            client_secret: format!("pi_fake_{n}_secret"),
            amount,
        })
    }
}
