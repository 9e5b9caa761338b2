//! Checkout service: quoting, payment authorization, and the order
//! persistence saga.
//!
//! An order is written in two steps (order row, then item rows). The window
//! between payment capture and a fully persisted order is the dangerous part:
//! a failure there must leave either no order or an order explicitly flagged
//! for repair, and must always be surfaced to the caller. The background
//! sweep repairs whatever slips through.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use ffmarket_core::{Amount, DomainError, OrderId};
use ffmarket_orders::{
    generate_order_number, price_cart, CartLine, CheckoutPolicy, Order, OrderStatus, Quote,
    ShippingAddress,
};

use crate::payment::{GatewayError, PaymentGateway, PaymentIntent};
use crate::store::{OrderStore, ProductCatalog, StoreError};

/// How long an order may sit in `pending_items` before the sweep treats it as
/// abandoned by a crashed checkout.
pub const DEFAULT_STALE_AFTER: Duration = Duration::minutes(30);

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Payment was captured but the order could not be fully persisted or
    /// compensated. The order is flagged for reconciliation; the caller must
    /// surface this, never retry blindly.
    #[error("order {order_number} ({order_id}) requires reconciliation: {detail}")]
    Inconsistent {
        order_id: OrderId,
        order_number: String,
        detail: String,
    },
}

#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub email: String,
    pub shipping_address: ShippingAddress,
    pub lines: Vec<CartLine>,
    pub payment_intent_id: String,
    /// Totals as displayed to the buyer. Compared against the server's own
    /// recomputation; any difference rejects the order.
    pub claimed_subtotal: Amount,
    pub claimed_shipping: Amount,
    pub claimed_total: Amount,
}

/// Outcome of one stale-order sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub examined: usize,
    pub cancelled: usize,
    pub flagged: usize,
}

pub struct CheckoutService {
    catalog: Arc<dyn ProductCatalog>,
    orders: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    policy: CheckoutPolicy,
    stale_after: Duration,
}

impl CheckoutService {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        orders: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            catalog,
            orders,
            gateway,
            policy: CheckoutPolicy::default(),
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Price a cart from the catalog. Client-supplied prices never enter the
    /// computation; a mismatch against the catalog is logged as tampering.
    pub async fn quote(&self, lines: &[CartLine]) -> Result<Quote, CheckoutError> {
        if lines.is_empty() {
            return Err(DomainError::validation("cart must not be empty").into());
        }

        let ids: Vec<_> = lines.iter().map(|l| l.product_id).collect();
        let snapshots = self.catalog.snapshots(&ids).await?;

        let mut resolved = Vec::with_capacity(lines.len());
        for line in lines {
            let snapshot = snapshots.get(&line.product_id).ok_or_else(|| {
                DomainError::validation(format!("unknown product {}", line.product_id))
            })?;
            if let Some(claimed) = line.claimed_unit_price {
                if claimed != snapshot.unit_price {
                    warn!(
                        product_id = %line.product_id,
                        claimed = %claimed,
                        actual = %snapshot.unit_price,
                        "client price differs from catalog; using catalog price"
                    );
                }
            }
            resolved.push((line.clone(), snapshot.clone()));
        }

        Ok(price_cart(&resolved, self.policy)?)
    }

    /// Quote the cart and authorize payment for exactly that total.
    pub async fn create_payment_intent(
        &self,
        lines: &[CartLine],
    ) -> Result<(PaymentIntent, Quote), CheckoutError> {
        let quote = self.quote(lines).await?;
        let intent = self.gateway.create_intent(quote.total).await?;
        info!(intent_id = %intent.id, total = %quote.total, "payment intent created");
        Ok((intent, quote))
    }

    /// Persist a paid order.
    ///
    /// The client's totals are recomputed server-side and must match exactly.
    /// Persistence is a two-phase saga: order row in `pending_items`, item
    /// rows, then flip to `paid`. Item failure triggers a compensating
    /// delete; if even the delete fails the order is flagged
    /// `needs_reconciliation` and the inconsistency is returned, not hidden.
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<Order, CheckoutError> {
        let quote = self.quote(&request.lines).await?;
        self.check_claimed_totals(&request, &quote)?;

        let mut rng = StdRng::from_entropy();
        let order_number = generate_order_number(Utc::now().date_naive(), &mut rng);
        let (order, items) = Order::from_quote(
            order_number,
            request.email,
            request.shipping_address,
            request.payment_intent_id,
            &quote,
        );

        self.orders.insert_order(order.clone()).await?;

        if let Err(item_err) = self.orders.insert_items(order.id, &items).await {
            warn!(
                order_id = %order.id,
                order_number = %order.order_number,
                error = %item_err,
                "item persistence failed; compensating"
            );
            return match self.orders.delete_order(order.id).await {
                Ok(()) => {
                    info!(order_id = %order.id, "orphan order deleted");
                    Err(item_err.into())
                }
                Err(delete_err) => {
                    error!(
                        order_id = %order.id,
                        order_number = %order.order_number,
                        error = %delete_err,
                        "compensating delete failed; flagging for reconciliation"
                    );
                    // Best effort: the sweep will catch this order even if
                    // the flag write fails too.
                    let _ = self
                        .orders
                        .set_status(order.id, OrderStatus::NeedsReconciliation)
                        .await;
                    Err(CheckoutError::Inconsistent {
                        order_id: order.id,
                        order_number: order.order_number.clone(),
                        detail: format!(
                            "items failed ({item_err}) and compensation failed ({delete_err})"
                        ),
                    })
                }
            };
        }

        if let Err(flip_err) = self.orders.set_status(order.id, OrderStatus::Paid).await {
            error!(
                order_id = %order.id,
                order_number = %order.order_number,
                error = %flip_err,
                "order fully written but status flip failed"
            );
            return Err(CheckoutError::Inconsistent {
                order_id: order.id,
                order_number: order.order_number.clone(),
                detail: format!("items persisted but status flip failed ({flip_err})"),
            });
        }

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "order created"
        );
        Ok(Order {
            status: OrderStatus::Paid,
            ..order
        })
    }

    fn check_claimed_totals(
        &self,
        request: &CreateOrderRequest,
        quote: &Quote,
    ) -> Result<(), CheckoutError> {
        if request.claimed_subtotal != quote.subtotal
            || request.claimed_shipping != quote.shipping
            || request.claimed_total != quote.total
        {
            warn!(
                claimed_total = %request.claimed_total,
                computed_total = %quote.total,
                "client totals do not match server computation"
            );
            return Err(DomainError::validation(format!(
                "order total mismatch: client sent {}, server computed {}",
                request.claimed_total, quote.total
            ))
            .into());
        }
        Ok(())
    }

    /// Repair pass for orders stuck mid-saga.
    ///
    /// Orders still in `pending_items` past the staleness window are either
    /// cancelled (no items ever landed) or flagged for manual reconciliation
    /// (part-written).
    pub async fn sweep_stale_orders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, CheckoutError> {
        let cutoff = now - self.stale_after;
        let stale = self.orders.stale_pending_orders(cutoff).await?;

        let mut report = SweepReport {
            examined: stale.len(),
            ..SweepReport::default()
        };

        for order in stale {
            let items = self.orders.item_count(order.id).await?;
            if items == 0 {
                self.orders
                    .set_status(order.id, OrderStatus::Cancelled)
                    .await?;
                info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    "stale empty order cancelled"
                );
                report.cancelled += 1;
            } else {
                self.orders
                    .set_status(order.id, OrderStatus::NeedsReconciliation)
                    .await?;
                warn!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    items,
                    "stale part-written order flagged for reconciliation"
                );
                report.flagged += 1;
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                cancelled = report.cancelled,
                flagged = report.flagged,
                "stale order sweep finished"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::FakePaymentGateway;
    use crate::store::in_memory::InMemoryStore;
    use async_trait::async_trait;
    use ffmarket_core::ProductId;
    use ffmarket_orders::{OrderItem, ProductSnapshot};
    use std::sync::atomic::{AtomicBool, Ordering};

    async fn seed_product(store: &InMemoryStore, price: i64) -> ProductId {
        let id = ProductId::new();
        store
            .insert_product(ProductSnapshot {
                product_id: id,
                name: "Linen Shirt".to_string(),
                unit_price: Amount::from_minor(price),
            })
            .await
            .unwrap();
        id
    }

    fn line(product_id: ProductId, quantity: u32) -> CartLine {
        CartLine {
            product_id,
            quantity,
            size: None,
            claimed_unit_price: None,
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            first_name: "Ada".to_string(),
            last_name: "Lively".to_string(),
            address1: "1 Loom Lane".to_string(),
            address2: None,
            city: "Antwerp".to_string(),
            state: "VAN".to_string(),
            postal_code: "2000".to_string(),
            country: "BE".to_string(),
        }
    }

    fn service(store: Arc<InMemoryStore>) -> CheckoutService {
        CheckoutService::new(store.clone(), store, Arc::new(FakePaymentGateway::new()))
    }

    fn request(lines: Vec<CartLine>, subtotal: i64, shipping: i64) -> CreateOrderRequest {
        CreateOrderRequest {
            email: "ada@example.com".to_string(),
            shipping_address: address(),
            lines,
            payment_intent_id: "pi_test_1".to_string(),
            claimed_subtotal: Amount::from_minor(subtotal),
            claimed_shipping: Amount::from_minor(shipping),
            claimed_total: Amount::from_minor(subtotal + shipping),
        }
    }

    #[tokio::test]
    async fn create_order_persists_a_paid_order_with_items() {
        let store = Arc::new(InMemoryStore::new());
        let a = seed_product(&store, 5000).await;
        let b = seed_product(&store, 3000).await;
        let svc = service(store.clone());

        let order = svc
            .create_order(request(vec![line(a, 2), line(b, 1)], 13000, 1500))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.total, Amount::from_minor(14500));
        assert!(order.order_number.starts_with("FF-"));

        let stored = store.order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Paid);
        assert_eq!(store.item_count(order.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn tampered_totals_are_rejected_without_persisting() {
        let store = Arc::new(InMemoryStore::new());
        let a = seed_product(&store, 5000).await;
        let svc = service(store.clone());

        let mut req = request(vec![line(a, 1)], 5000, 1500);
        req.claimed_total = Amount::from_minor(100);
        let err = svc.create_order(req).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Domain(DomainError::Validation(_))
        ));

        assert!(store
            .stale_pending_orders(Utc::now() + Duration::hours(1))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn unknown_product_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service(store);

        let err = svc.quote(&[line(ProductId::new(), 1)]).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Domain(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn payment_intent_covers_the_computed_total() {
        let store = Arc::new(InMemoryStore::new());
        let a = seed_product(&store, 25000).await;
        let svc = service(store);

        let (intent, quote) = svc.create_payment_intent(&[line(a, 1)]).await.unwrap();
        // Above the free-shipping threshold.
        assert_eq!(quote.shipping, Amount::ZERO);
        assert_eq!(intent.amount, Amount::from_minor(25000));
    }

    /// Order store wrapper whose item writes (and optionally deletes) fail.
    struct FlakyOrderStore {
        inner: Arc<InMemoryStore>,
        fail_items: AtomicBool,
        fail_delete: AtomicBool,
    }

    #[async_trait]
    impl OrderStore for FlakyOrderStore {
        async fn insert_order(&self, order: Order) -> Result<(), StoreError> {
            self.inner.insert_order(order).await
        }

        async fn insert_items(
            &self,
            order_id: OrderId,
            items: &[OrderItem],
        ) -> Result<(), StoreError> {
            if self.fail_items.load(Ordering::SeqCst) {
                return Err(StoreError::Storage("items write refused".to_string()));
            }
            self.inner.insert_items(order_id, items).await
        }

        async fn set_status(
            &self,
            order_id: OrderId,
            status: OrderStatus,
        ) -> Result<(), StoreError> {
            self.inner.set_status(order_id, status).await
        }

        async fn delete_order(&self, order_id: OrderId) -> Result<(), StoreError> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(StoreError::Storage("delete refused".to_string()));
            }
            self.inner.delete_order(order_id).await
        }

        async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
            self.inner.order(id).await
        }

        async fn item_count(&self, order_id: OrderId) -> Result<usize, StoreError> {
            self.inner.item_count(order_id).await
        }

        async fn stale_pending_orders(
            &self,
            cutoff: DateTime<Utc>,
        ) -> Result<Vec<Order>, StoreError> {
            self.inner.stale_pending_orders(cutoff).await
        }
    }

    #[tokio::test]
    async fn item_failure_compensates_by_deleting_the_order() {
        let store = Arc::new(InMemoryStore::new());
        let a = seed_product(&store, 5000).await;
        let flaky = Arc::new(FlakyOrderStore {
            inner: store.clone(),
            fail_items: AtomicBool::new(true),
            fail_delete: AtomicBool::new(false),
        });
        let svc = CheckoutService::new(store.clone(), flaky, Arc::new(FakePaymentGateway::new()));

        let err = svc
            .create_order(request(vec![line(a, 1)], 5000, 1500))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Store(_)));

        // Compensated: nothing left behind.
        assert!(store
            .stale_pending_orders(Utc::now() + Duration::hours(1))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn failed_compensation_flags_the_order_and_surfaces_the_inconsistency() {
        let store = Arc::new(InMemoryStore::new());
        let a = seed_product(&store, 5000).await;
        let flaky = Arc::new(FlakyOrderStore {
            inner: store.clone(),
            fail_items: AtomicBool::new(true),
            fail_delete: AtomicBool::new(true),
        });
        let svc = CheckoutService::new(store.clone(), flaky, Arc::new(FakePaymentGateway::new()));

        let err = svc
            .create_order(request(vec![line(a, 1)], 5000, 1500))
            .await
            .unwrap_err();
        let order_id = match err {
            CheckoutError::Inconsistent { order_id, .. } => order_id,
            other => panic!("expected inconsistency, got {other}"),
        };

        let stored = store.order(order_id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::NeedsReconciliation);
    }

    #[tokio::test]
    async fn sweep_cancels_empty_and_flags_part_written_orders() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service(store.clone());

        // An empty stuck order and a part-written one, both past the window.
        let old = Utc::now() - Duration::hours(1);
        let a = seed_product(&store, 5000).await;
        let quote = svc.quote(&[line(a, 1)]).await.unwrap();

        let (mut empty, _) = Order::from_quote(
            "FF-20250601-0001".to_string(),
            "x@example.com".to_string(),
            address(),
            "pi_1".to_string(),
            &quote,
        );
        empty.created_at = old;
        let empty_id = empty.id;
        store.insert_order(empty).await.unwrap();

        let (mut partial, items) = Order::from_quote(
            "FF-20250601-0002".to_string(),
            "y@example.com".to_string(),
            address(),
            "pi_2".to_string(),
            &quote,
        );
        partial.created_at = old;
        let partial_id = partial.id;
        store.insert_order(partial).await.unwrap();
        store.insert_items(partial_id, &items).await.unwrap();

        let report = svc.sweep_stale_orders(Utc::now()).await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                examined: 2,
                cancelled: 1,
                flagged: 1,
            }
        );
        assert_eq!(
            store.order(empty_id).await.unwrap().unwrap().status,
            OrderStatus::Cancelled
        );
        assert_eq!(
            store.order(partial_id).await.unwrap().unwrap().status,
            OrderStatus::NeedsReconciliation
        );
    }

    #[tokio::test]
    async fn fresh_pending_orders_are_left_alone() {
        let store = Arc::new(InMemoryStore::new());
        let a = seed_product(&store, 5000).await;
        let svc = service(store.clone());
        let quote = svc.quote(&[line(a, 1)]).await.unwrap();

        let (order, _) = Order::from_quote(
            "FF-20250601-0003".to_string(),
            "z@example.com".to_string(),
            address(),
            "pi_3".to_string(),
            &quote,
        );
        let order_id = order.id;
        store.insert_order(order).await.unwrap();

        let report = svc.sweep_stale_orders(Utc::now()).await.unwrap();
        assert_eq!(report.examined, 0);
        assert_eq!(
            store.order(order_id).await.unwrap().unwrap().status,
            OrderStatus::PendingItems
        );
    }
}
