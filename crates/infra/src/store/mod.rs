//! Storage ports.
//!
//! Each port is a narrow trait over exactly the queries and writes the
//! services need. Implementations must make [`PayoutStore::commit_payout`]
//! atomic: either the payout row and every sale seal land together, or
//! nothing changes.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use ffmarket_core::{OrderId, PartnerId, PayoutId, ProductId, SaleId};
use ffmarket_orders::{Order, OrderItem, OrderStatus, ProductSnapshot};
use ffmarket_settlement::{Payout, Sale};

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

/// Storage operation error. Infrastructure failures only; business rules are
/// checked in the domain crates before a write is attempted.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A conditional write matched fewer rows than the batch. The store
    /// guarantees zero net mutation when this is returned.
    #[error("conditional write conflict: {0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

#[async_trait]
pub trait SalesStore: Send + Sync {
    async fn insert_sale(&self, sale: Sale) -> Result<(), StoreError>;

    /// All sales that are completed and not yet attached to a payout.
    async fn payable_sales(&self) -> Result<Vec<Sale>, StoreError>;

    /// Resolve a batch of sale ids. Missing ids are simply absent from the
    /// map; the caller decides whether that is an error.
    async fn sales_by_ids(&self, ids: &[SaleId]) -> Result<HashMap<SaleId, Sale>, StoreError>;

    async fn sales_for_partner(&self, partner_id: PartnerId) -> Result<Vec<Sale>, StoreError>;
}

#[async_trait]
pub trait PayoutStore: Send + Sync {
    /// Persist `payout` and seal every sale in `sale_ids` to it, atomically.
    ///
    /// A sale is sealed only if its `payout_id` is still unset; the number of
    /// sales sealed must equal the batch size or the whole commit is rolled
    /// back and `Conflict` returned. This is the last-line guard against a
    /// concurrent payout racing the same sales.
    ///
    /// Returns the number of sales sealed (always `sale_ids.len()` on
    /// success).
    async fn commit_payout(&self, payout: Payout, sale_ids: &[SaleId])
        -> Result<usize, StoreError>;

    async fn payout(&self, id: PayoutId) -> Result<Option<Payout>, StoreError>;

    async fn payouts_for_partner(&self, partner_id: PartnerId) -> Result<Vec<Payout>, StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: Order) -> Result<(), StoreError>;

    async fn insert_items(&self, order_id: OrderId, items: &[OrderItem])
        -> Result<(), StoreError>;

    async fn set_status(&self, order_id: OrderId, status: OrderStatus) -> Result<(), StoreError>;

    /// Compensating delete: removes the order row and any items already
    /// written for it.
    async fn delete_order(&self, order_id: OrderId) -> Result<(), StoreError>;

    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    async fn item_count(&self, order_id: OrderId) -> Result<usize, StoreError>;

    /// Orders still in `pending_items` created at or before `cutoff`.
    async fn stale_pending_orders(&self, cutoff: DateTime<Utc>)
        -> Result<Vec<Order>, StoreError>;
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn insert_product(&self, snapshot: ProductSnapshot) -> Result<(), StoreError>;

    /// Resolve product snapshots for pricing. Missing ids are absent from the
    /// map.
    async fn snapshots(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, ProductSnapshot>, StoreError>;
}
