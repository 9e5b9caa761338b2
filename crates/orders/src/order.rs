//! Order and line-item records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ffmarket_core::{Amount, DomainError, DomainResult, OrderId, ProductId};

use crate::cart::Quote;

/// Order persistence lifecycle.
///
/// Orders are written in two steps (order row, then item rows), so the status
/// tracks the saga: `pending_items` until every line is persisted, then
/// `paid`. `needs_reconciliation` flags a paid order whose items could not be
/// written and whose compensating delete also failed; `cancelled` is the
/// compensated terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingItems,
    Paid,
    NeedsReconciliation,
    Cancelled,
}

/// Buyer shipping address, stored verbatim on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub address1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// A buyer order. `order_number` is a human-readable business key, not the
/// identity; `id` is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub email: String,
    pub status: OrderStatus,
    pub subtotal: Amount,
    pub shipping: Amount,
    pub tax: Amount,
    pub total: Amount,
    pub shipping_address: ShippingAddress,
    pub payment_intent_id: String,
    pub created_at: DateTime<Utc>,
}

/// One order line with price and name snapshots taken at order time,
/// independent of later catalog changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Amount,
    pub size: Option<String>,
}

impl Order {
    /// Build an order (and its items) from an authoritative quote.
    ///
    /// Starts in `pending_items`; the storage saga flips it to `paid` once
    /// every item row is persisted.
    pub fn from_quote(
        order_number: String,
        email: String,
        shipping_address: ShippingAddress,
        payment_intent_id: String,
        quote: &Quote,
    ) -> (Order, Vec<OrderItem>) {
        let id = OrderId::new();
        let order = Order {
            id,
            order_number,
            email,
            status: OrderStatus::PendingItems,
            subtotal: quote.subtotal,
            shipping: quote.shipping,
            tax: quote.tax,
            total: quote.total,
            shipping_address,
            payment_intent_id,
            created_at: Utc::now(),
        };
        let items = quote
            .lines
            .iter()
            .map(|line| OrderItem {
                order_id: id,
                product_id: line.snapshot.product_id,
                product_name: line.snapshot.name.clone(),
                quantity: line.quantity,
                unit_price: line.snapshot.unit_price,
                size: line.size.clone(),
            })
            .collect();
        (order, items)
    }

    /// Check the creation-time invariant: item line totals sum to the
    /// order's subtotal.
    pub fn check_items(&self, items: &[OrderItem]) -> DomainResult<()> {
        let sum = Amount::checked_sum(
            items
                .iter()
                .map(|i| i.unit_price.checked_mul_qty(i.quantity))
                .collect::<DomainResult<Vec<_>>>()?,
        )?;
        if sum != self.subtotal {
            return Err(DomainError::validation(format!(
                "item totals {sum} do not match order subtotal {}",
                self.subtotal
            )));
        }
        Ok(())
    }
}
