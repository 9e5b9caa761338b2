//! `ffmarket-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod amount;
pub mod error;
pub mod id;

pub use amount::Amount;
pub use error::{DomainError, DomainResult};
pub use id::{OrderId, PartnerId, PayoutId, ProductId, SaleId};
