//! In-memory store for tests and development. Not optimized for performance.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ffmarket_core::{OrderId, PartnerId, PayoutId, ProductId, SaleId};
use ffmarket_orders::{Order, OrderItem, OrderStatus, ProductSnapshot};
use ffmarket_settlement::{Payout, Sale, SaleStatus};

use super::{OrderStore, PayoutStore, ProductCatalog, SalesStore, StoreError};

fn poisoned() -> StoreError {
    StoreError::Storage("lock poisoned".to_string())
}

/// One store backing all four ports, the in-memory stand-in for the database.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    sales: RwLock<HashMap<SaleId, Sale>>,
    payouts: RwLock<HashMap<PayoutId, Payout>>,
    orders: RwLock<HashMap<OrderId, Order>>,
    order_items: RwLock<HashMap<OrderId, Vec<OrderItem>>>,
    products: RwLock<HashMap<ProductId, ProductSnapshot>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SalesStore for InMemoryStore {
    async fn insert_sale(&self, sale: Sale) -> Result<(), StoreError> {
        let mut sales = self.sales.write().map_err(|_| poisoned())?;
        sales.insert(sale.id, sale);
        Ok(())
    }

    async fn payable_sales(&self) -> Result<Vec<Sale>, StoreError> {
        let sales = self.sales.read().map_err(|_| poisoned())?;
        Ok(sales.values().filter(|s| s.is_payable()).cloned().collect())
    }

    async fn sales_by_ids(&self, ids: &[SaleId]) -> Result<HashMap<SaleId, Sale>, StoreError> {
        let sales = self.sales.read().map_err(|_| poisoned())?;
        Ok(ids
            .iter()
            .filter_map(|id| sales.get(id).map(|s| (*id, s.clone())))
            .collect())
    }

    async fn sales_for_partner(&self, partner_id: PartnerId) -> Result<Vec<Sale>, StoreError> {
        let sales = self.sales.read().map_err(|_| poisoned())?;
        Ok(sales
            .values()
            .filter(|s| s.partner_id == partner_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PayoutStore for InMemoryStore {
    async fn commit_payout(
        &self,
        payout: Payout,
        sale_ids: &[SaleId],
    ) -> Result<usize, StoreError> {
        // The sales write lock is held across the check and the mutation, so
        // the whole batch is a single atomic step. The precheck must cover
        // every way a seal could be refused; the mutation loop below is
        // infallible, so a rejected batch leaves zero net mutation.
        let mut sales = self.sales.write().map_err(|_| poisoned())?;

        let mut seen = HashSet::with_capacity(sale_ids.len());
        for id in sale_ids {
            if !seen.insert(*id) {
                return Err(StoreError::Conflict(format!(
                    "sale {id} appears more than once in the batch"
                )));
            }
            match sales.get(id) {
                Some(sale) if sale.is_payable() => {}
                Some(_) => {
                    return Err(StoreError::Conflict(format!(
                        "sale {id} is not completed or already attached to a payout"
                    )));
                }
                None => return Err(StoreError::NotFound(format!("sale {id}"))),
            }
        }

        for id in sale_ids {
            if let Some(sale) = sales.get_mut(id) {
                sale.status = SaleStatus::PaidOut;
                sale.payout_id = Some(payout.id);
            }
        }

        let mut payouts = self.payouts.write().map_err(|_| poisoned())?;
        payouts.insert(payout.id, payout);
        Ok(sale_ids.len())
    }

    async fn payout(&self, id: PayoutId) -> Result<Option<Payout>, StoreError> {
        let payouts = self.payouts.read().map_err(|_| poisoned())?;
        Ok(payouts.get(&id).cloned())
    }

    async fn payouts_for_partner(&self, partner_id: PartnerId) -> Result<Vec<Payout>, StoreError> {
        let payouts = self.payouts.read().map_err(|_| poisoned())?;
        Ok(payouts
            .values()
            .filter(|p| p.partner_id == partner_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: Order) -> Result<(), StoreError> {
        let mut orders = self.orders.write().map_err(|_| poisoned())?;
        orders.insert(order.id, order);
        Ok(())
    }

    async fn insert_items(
        &self,
        order_id: OrderId,
        items: &[OrderItem],
    ) -> Result<(), StoreError> {
        let orders = self.orders.read().map_err(|_| poisoned())?;
        if !orders.contains_key(&order_id) {
            return Err(StoreError::NotFound(format!("order {order_id}")));
        }
        drop(orders);

        let mut order_items = self.order_items.write().map_err(|_| poisoned())?;
        order_items
            .entry(order_id)
            .or_default()
            .extend_from_slice(items);
        Ok(())
    }

    async fn set_status(&self, order_id: OrderId, status: OrderStatus) -> Result<(), StoreError> {
        let mut orders = self.orders.write().map_err(|_| poisoned())?;
        match orders.get_mut(&order_id) {
            Some(order) => {
                order.status = status;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("order {order_id}"))),
        }
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<(), StoreError> {
        let mut orders = self.orders.write().map_err(|_| poisoned())?;
        let mut order_items = self.order_items.write().map_err(|_| poisoned())?;
        orders.remove(&order_id);
        order_items.remove(&order_id);
        Ok(())
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let orders = self.orders.read().map_err(|_| poisoned())?;
        Ok(orders.get(&id).cloned())
    }

    async fn item_count(&self, order_id: OrderId) -> Result<usize, StoreError> {
        let order_items = self.order_items.read().map_err(|_| poisoned())?;
        Ok(order_items.get(&order_id).map_or(0, Vec::len))
    }

    async fn stale_pending_orders(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().map_err(|_| poisoned())?;
        Ok(orders
            .values()
            .filter(|o| o.status == OrderStatus::PendingItems && o.created_at <= cutoff)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProductCatalog for InMemoryStore {
    async fn insert_product(&self, snapshot: ProductSnapshot) -> Result<(), StoreError> {
        let mut products = self.products.write().map_err(|_| poisoned())?;
        products.insert(snapshot.product_id, snapshot);
        Ok(())
    }

    async fn snapshots(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, ProductSnapshot>, StoreError> {
        let products = self.products.read().map_err(|_| poisoned())?;
        Ok(ids
            .iter()
            .filter_map(|id| products.get(id).map(|p| (*id, p.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffmarket_core::Amount;
    use ffmarket_settlement::{PayoutMethod, SaleStatus};

    fn completed_sale(partner_id: PartnerId, payout_amount: i64) -> Sale {
        let mut sale = Sale::new(
            partner_id,
            Amount::from_minor(payout_amount * 2),
            Amount::from_minor(payout_amount),
            Amount::from_minor(payout_amount),
        );
        sale.status = SaleStatus::Completed;
        sale
    }

    #[tokio::test]
    async fn commit_payout_seals_every_sale_in_the_batch() {
        let store = InMemoryStore::new();
        let partner = PartnerId::new();
        let a = completed_sale(partner, 1000);
        let b = completed_sale(partner, 2000);
        let ids = vec![a.id, b.id];
        store.insert_sale(a).await.unwrap();
        store.insert_sale(b).await.unwrap();

        let payout = Payout::new(
            partner,
            Amount::from_minor(3000),
            PayoutMethod::BankTransfer,
            None,
        );
        let payout_id = payout.id;

        let sealed = store.commit_payout(payout, &ids).await.unwrap();
        assert_eq!(sealed, 2);

        let resolved = store.sales_by_ids(&ids).await.unwrap();
        for sale in resolved.values() {
            assert_eq!(sale.payout_id, Some(payout_id));
            assert_eq!(sale.status, SaleStatus::PaidOut);
        }
        assert!(store.payout(payout_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn commit_payout_with_an_already_sealed_sale_mutates_nothing() {
        let store = InMemoryStore::new();
        let partner = PartnerId::new();
        let fresh = completed_sale(partner, 1000);
        let mut sealed = completed_sale(partner, 2000);
        let prior = PayoutId::new();
        sealed.attach_payout(prior).unwrap();
        let ids = vec![fresh.id, sealed.id];
        store.insert_sale(fresh.clone()).await.unwrap();
        store.insert_sale(sealed).await.unwrap();

        let payout = Payout::new(
            partner,
            Amount::from_minor(3000),
            PayoutMethod::BankTransfer,
            None,
        );
        let payout_id = payout.id;

        let err = store.commit_payout(payout, &ids).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // Zero net mutation: the fresh sale is untouched, no payout row.
        let resolved = store.sales_by_ids(&[fresh.id]).await.unwrap();
        assert_eq!(resolved[&fresh.id].payout_id, None);
        assert!(store.payout(payout_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commit_payout_with_a_duplicated_sale_id_mutates_nothing() {
        let store = InMemoryStore::new();
        let partner = PartnerId::new();
        let sale = completed_sale(partner, 1000);
        let sale_id = sale.id;
        store.insert_sale(sale).await.unwrap();

        let payout = Payout::new(
            partner,
            Amount::from_minor(2000),
            PayoutMethod::BankTransfer,
            None,
        );
        let payout_id = payout.id;

        // Listing the same sale twice must refuse the whole batch, not seal
        // the sale on the first pass and choke on the second.
        let err = store
            .commit_payout(payout, &[sale_id, sale_id])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let resolved = store.sales_by_ids(&[sale_id]).await.unwrap();
        assert_eq!(resolved[&sale_id].payout_id, None);
        assert_eq!(resolved[&sale_id].status, SaleStatus::Completed);
        assert!(store.payout(payout_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commit_payout_with_a_pending_sale_mutates_nothing() {
        let store = InMemoryStore::new();
        let partner = PartnerId::new();
        let fresh = completed_sale(partner, 1000);
        let pending = Sale::new(
            partner,
            Amount::from_minor(4000),
            Amount::from_minor(2000),
            Amount::from_minor(2000),
        );
        let ids = vec![fresh.id, pending.id];
        store.insert_sale(fresh.clone()).await.unwrap();
        store.insert_sale(pending).await.unwrap();

        let payout = Payout::new(
            partner,
            Amount::from_minor(3000),
            PayoutMethod::BankTransfer,
            None,
        );
        let payout_id = payout.id;

        let err = store.commit_payout(payout, &ids).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let resolved = store.sales_by_ids(&[fresh.id]).await.unwrap();
        assert_eq!(resolved[&fresh.id].payout_id, None);
        assert_eq!(resolved[&fresh.id].status, SaleStatus::Completed);
        assert!(store.payout(payout_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_order_removes_items_too() {
        let store = InMemoryStore::new();
        let order = sample_order();
        let order_id = order.id;
        store.insert_order(order).await.unwrap();
        store
            .insert_items(order_id, &[sample_item(order_id)])
            .await
            .unwrap();
        assert_eq!(store.item_count(order_id).await.unwrap(), 1);

        store.delete_order(order_id).await.unwrap();
        assert!(store.order(order_id).await.unwrap().is_none());
        assert_eq!(store.item_count(order_id).await.unwrap(), 0);
    }

    fn sample_order() -> Order {
        Order {
            id: OrderId::new(),
            order_number: "FF-20250101-0042".to_string(),
            email: "buyer@example.com".to_string(),
            status: OrderStatus::PendingItems,
            subtotal: Amount::from_minor(5000),
            shipping: Amount::from_minor(1500),
            tax: Amount::ZERO,
            total: Amount::from_minor(6500),
            shipping_address: ffmarket_orders::ShippingAddress {
                first_name: "Ada".to_string(),
                last_name: "Lively".to_string(),
                address1: "1 Main St".to_string(),
                address2: None,
                city: "Springfield".to_string(),
                state: "OR".to_string(),
                postal_code: "97477".to_string(),
                country: "US".to_string(),
            },
            payment_intent_id: "pi_test_1".to_string(),
            created_at: Utc::now(),
        }
    }

    fn sample_item(order_id: OrderId) -> OrderItem {
        OrderItem {
            order_id,
            product_id: ProductId::new(),
            product_name: "Linen Shirt".to_string(),
            quantity: 1,
            unit_price: Amount::from_minor(5000),
            size: Some("M".to_string()),
        }
    }
}
