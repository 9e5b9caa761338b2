//! `ffmarket-infra` — storage ports and the services that drive the domain.
//!
//! Storage is trait-per-concern with two implementations each: an in-memory
//! store for tests and development, and a Postgres store (behind the
//! `postgres` feature) whose conditional writes are enforced in SQL. Services
//! own the money-critical flows: settlement (payout batches) and checkout
//! (payment capture + order persistence).

pub mod checkout;
pub mod payment;
pub mod settlement;
pub mod store;

pub use checkout::{CheckoutError, CheckoutService, CreateOrderRequest, SweepReport};
pub use payment::{FakePaymentGateway, GatewayError, PaymentGateway, PaymentIntent};
pub use settlement::{
    PartnerSummary, PayoutReceipt, ProcessPayoutRequest, SettlementError, SettlementService,
};
pub use store::in_memory::InMemoryStore;
pub use store::{OrderStore, PayoutStore, ProductCatalog, SalesStore, StoreError};
