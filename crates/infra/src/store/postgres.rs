//! Postgres-backed stores.
//!
//! Conditional writes are enforced in SQL: a payout commit updates sales with
//! `WHERE payout_id IS NULL` inside a transaction and compares the affected
//! row count against the batch size, rolling back on any shortfall. Losing a
//! race therefore surfaces as a conflict, never as a double payment.
//!
//! Expected tables (see [`migrate`]): `sales`, `payouts`, `orders`,
//! `order_items`, `products`. Statuses are stored as text, amounts as
//! `BIGINT` minor units.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use ffmarket_core::{Amount, OrderId, PartnerId, PayoutId, ProductId, SaleId};
use ffmarket_orders::{Order, OrderItem, OrderStatus, ProductSnapshot, ShippingAddress};
use ffmarket_settlement::{Payout, PayoutMethod, PayoutStatus, Sale, SaleStatus};

use super::{OrderStore, PayoutStore, ProductCatalog, SalesStore, StoreError};

/// All four ports over one connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Create the tables if they do not exist. Suitable for development; managed
/// deployments run their own migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(
        r#"
        CREATE TABLE IF NOT EXISTS sales (
            id UUID PRIMARY KEY,
            partner_id UUID NOT NULL,
            sale_amount BIGINT NOT NULL,
            commission_amount BIGINT NOT NULL,
            partner_payout_amount BIGINT NOT NULL,
            status TEXT NOT NULL,
            payout_id UUID,
            created_at TIMESTAMPTZ NOT NULL
        );
        CREATE TABLE IF NOT EXISTS payouts (
            id UUID PRIMARY KEY,
            partner_id UUID NOT NULL,
            amount BIGINT NOT NULL,
            status TEXT NOT NULL,
            method TEXT NOT NULL,
            reference TEXT,
            processed_at TIMESTAMPTZ NOT NULL
        );
        CREATE TABLE IF NOT EXISTS orders (
            id UUID PRIMARY KEY,
            order_number TEXT NOT NULL,
            email TEXT NOT NULL,
            status TEXT NOT NULL,
            subtotal BIGINT NOT NULL,
            shipping BIGINT NOT NULL,
            tax BIGINT NOT NULL,
            total BIGINT NOT NULL,
            shipping_address JSONB NOT NULL,
            payment_intent_id TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        );
        CREATE TABLE IF NOT EXISTS order_items (
            order_id UUID NOT NULL,
            product_id UUID NOT NULL,
            product_name TEXT NOT NULL,
            quantity INT NOT NULL,
            unit_price BIGINT NOT NULL,
            size TEXT
        );
        CREATE TABLE IF NOT EXISTS products (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            unit_price BIGINT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await
    .map_err(storage)?;
    Ok(())
}

fn storage(e: sqlx::Error) -> StoreError {
    StoreError::Storage(e.to_string())
}

fn sale_status_str(status: SaleStatus) -> &'static str {
    match status {
        SaleStatus::Pending => "pending",
        SaleStatus::Processing => "processing",
        SaleStatus::Completed => "completed",
        SaleStatus::PaidOut => "paid_out",
    }
}

fn parse_sale_status(s: &str) -> Result<SaleStatus, StoreError> {
    match s {
        "pending" => Ok(SaleStatus::Pending),
        "processing" => Ok(SaleStatus::Processing),
        "completed" => Ok(SaleStatus::Completed),
        "paid_out" => Ok(SaleStatus::PaidOut),
        other => Err(StoreError::Storage(format!("bad sale status '{other}'"))),
    }
}

fn order_status_str(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::PendingItems => "pending_items",
        OrderStatus::Paid => "paid",
        OrderStatus::NeedsReconciliation => "needs_reconciliation",
        OrderStatus::Cancelled => "cancelled",
    }
}

fn parse_order_status(s: &str) -> Result<OrderStatus, StoreError> {
    match s {
        "pending_items" => Ok(OrderStatus::PendingItems),
        "paid" => Ok(OrderStatus::Paid),
        "needs_reconciliation" => Ok(OrderStatus::NeedsReconciliation),
        "cancelled" => Ok(OrderStatus::Cancelled),
        other => Err(StoreError::Storage(format!("bad order status '{other}'"))),
    }
}

fn method_str(method: PayoutMethod) -> &'static str {
    match method {
        PayoutMethod::BankTransfer => "bank_transfer",
        PayoutMethod::Paypal => "paypal",
    }
}

fn parse_method(s: &str) -> Result<PayoutMethod, StoreError> {
    match s {
        "bank_transfer" => Ok(PayoutMethod::BankTransfer),
        "paypal" => Ok(PayoutMethod::Paypal),
        other => Err(StoreError::Storage(format!("bad payout method '{other}'"))),
    }
}

fn sale_from_row(row: &sqlx::postgres::PgRow) -> Result<Sale, StoreError> {
    let status: String = row.try_get("status").map_err(storage)?;
    let payout_id: Option<Uuid> = row.try_get("payout_id").map_err(storage)?;
    Ok(Sale {
        id: SaleId::from_uuid(row.try_get("id").map_err(storage)?),
        partner_id: PartnerId::from_uuid(row.try_get("partner_id").map_err(storage)?),
        sale_amount: Amount::from_minor(row.try_get("sale_amount").map_err(storage)?),
        commission_amount: Amount::from_minor(row.try_get("commission_amount").map_err(storage)?),
        partner_payout_amount: Amount::from_minor(
            row.try_get("partner_payout_amount").map_err(storage)?,
        ),
        status: parse_sale_status(&status)?,
        payout_id: payout_id.map(PayoutId::from_uuid),
        created_at: row.try_get("created_at").map_err(storage)?,
    })
}

fn payout_from_row(row: &sqlx::postgres::PgRow) -> Result<Payout, StoreError> {
    let method: String = row.try_get("method").map_err(storage)?;
    Ok(Payout {
        id: PayoutId::from_uuid(row.try_get("id").map_err(storage)?),
        partner_id: PartnerId::from_uuid(row.try_get("partner_id").map_err(storage)?),
        amount: Amount::from_minor(row.try_get("amount").map_err(storage)?),
        status: PayoutStatus::Completed,
        method: parse_method(&method)?,
        reference: row.try_get("reference").map_err(storage)?,
        processed_at: row.try_get("processed_at").map_err(storage)?,
    })
}

fn order_from_row(row: &sqlx::postgres::PgRow) -> Result<Order, StoreError> {
    let status: String = row.try_get("status").map_err(storage)?;
    let address: serde_json::Value = row.try_get("shipping_address").map_err(storage)?;
    let shipping_address: ShippingAddress = serde_json::from_value(address)
        .map_err(|e| StoreError::Storage(format!("bad shipping address: {e}")))?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get("id").map_err(storage)?),
        order_number: row.try_get("order_number").map_err(storage)?,
        email: row.try_get("email").map_err(storage)?,
        status: parse_order_status(&status)?,
        subtotal: Amount::from_minor(row.try_get("subtotal").map_err(storage)?),
        shipping: Amount::from_minor(row.try_get("shipping").map_err(storage)?),
        tax: Amount::from_minor(row.try_get("tax").map_err(storage)?),
        total: Amount::from_minor(row.try_get("total").map_err(storage)?),
        shipping_address,
        payment_intent_id: row.try_get("payment_intent_id").map_err(storage)?,
        created_at: row.try_get("created_at").map_err(storage)?,
    })
}

#[async_trait]
impl SalesStore for PostgresStore {
    async fn insert_sale(&self, sale: Sale) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sales
                (id, partner_id, sale_amount, commission_amount,
                 partner_payout_amount, status, payout_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(sale.id.as_uuid())
        .bind(sale.partner_id.as_uuid())
        .bind(sale.sale_amount.minor())
        .bind(sale.commission_amount.minor())
        .bind(sale.partner_payout_amount.minor())
        .bind(sale_status_str(sale.status))
        .bind(sale.payout_id.map(Uuid::from))
        .bind(sale.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn payable_sales(&self) -> Result<Vec<Sale>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM sales WHERE status = 'completed' AND payout_id IS NULL \
             ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.iter().map(sale_from_row).collect()
    }

    async fn sales_by_ids(&self, ids: &[SaleId]) -> Result<HashMap<SaleId, Sale>, StoreError> {
        let uuids: Vec<Uuid> = ids.iter().copied().map(Uuid::from).collect();
        let rows = sqlx::query("SELECT * FROM sales WHERE id = ANY($1)")
            .bind(&uuids)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.iter()
            .map(|row| sale_from_row(row).map(|s| (s.id, s)))
            .collect()
    }

    async fn sales_for_partner(&self, partner_id: PartnerId) -> Result<Vec<Sale>, StoreError> {
        let rows = sqlx::query("SELECT * FROM sales WHERE partner_id = $1 ORDER BY created_at ASC")
            .bind(partner_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.iter().map(sale_from_row).collect()
    }
}

#[async_trait]
impl PayoutStore for PostgresStore {
    async fn commit_payout(
        &self,
        payout: Payout,
        sale_ids: &[SaleId],
    ) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query(
            r#"
            INSERT INTO payouts
                (id, partner_id, amount, status, method, reference, processed_at)
            VALUES ($1, $2, $3, 'completed', $4, $5, $6)
            "#,
        )
        .bind(payout.id.as_uuid())
        .bind(payout.partner_id.as_uuid())
        .bind(payout.amount.minor())
        .bind(method_str(payout.method))
        .bind(&payout.reference)
        .bind(payout.processed_at)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        let uuids: Vec<Uuid> = sale_ids.iter().copied().map(Uuid::from).collect();
        let updated = sqlx::query(
            r#"
            UPDATE sales
            SET payout_id = $1, status = 'paid_out'
            WHERE id = ANY($2) AND payout_id IS NULL AND status = 'completed'
            "#,
        )
        .bind(payout.id.as_uuid())
        .bind(&uuids)
        .execute(&mut *tx)
        .await
        .map_err(storage)?
        .rows_affected() as usize;

        if updated != sale_ids.len() {
            tx.rollback().await.map_err(storage)?;
            return Err(StoreError::Conflict(format!(
                "sealed {updated} of {} sales; batch aborted",
                sale_ids.len()
            )));
        }

        tx.commit().await.map_err(storage)?;
        Ok(updated)
    }

    async fn payout(&self, id: PayoutId) -> Result<Option<Payout>, StoreError> {
        let row = sqlx::query("SELECT * FROM payouts WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.as_ref().map(payout_from_row).transpose()
    }

    async fn payouts_for_partner(&self, partner_id: PartnerId) -> Result<Vec<Payout>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM payouts WHERE partner_id = $1 ORDER BY processed_at DESC",
        )
        .bind(partner_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.iter().map(payout_from_row).collect()
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert_order(&self, order: Order) -> Result<(), StoreError> {
        let address = serde_json::to_value(&order.shipping_address)
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO orders
                (id, order_number, email, status, subtotal, shipping, tax, total,
                 shipping_address, payment_intent_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(&order.order_number)
        .bind(&order.email)
        .bind(order_status_str(order.status))
        .bind(order.subtotal.minor())
        .bind(order.shipping.minor())
        .bind(order.tax.minor())
        .bind(order.total.minor())
        .bind(address)
        .bind(&order.payment_intent_id)
        .bind(order.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn insert_items(
        &self,
        order_id: OrderId,
        items: &[OrderItem],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items
                    (order_id, product_id, product_name, quantity, unit_price, size)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order_id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(&item.product_name)
            .bind(item.quantity as i32)
            .bind(item.unit_price.minor())
            .bind(&item.size)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }
        tx.commit().await.map_err(storage)?;
        Ok(())
    }

    async fn set_status(&self, order_id: OrderId, status: OrderStatus) -> Result<(), StoreError> {
        let updated = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
            .bind(order_status_str(status))
            .bind(order_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(storage)?
            .rows_affected();
        if updated == 0 {
            return Err(StoreError::NotFound(format!("order {order_id}")));
        }
        Ok(())
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        tx.commit().await.map_err(storage)?;
        Ok(())
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn item_count(&self, order_id: OrderId) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM order_items WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        let n: i64 = row.try_get("n").map_err(storage)?;
        Ok(n as usize)
    }

    async fn stale_pending_orders(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM orders WHERE status = 'pending_items' AND created_at <= $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.iter().map(order_from_row).collect()
    }
}

#[async_trait]
impl ProductCatalog for PostgresStore {
    async fn insert_product(&self, snapshot: ProductSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, unit_price)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET name = $2, unit_price = $3
            "#,
        )
        .bind(snapshot.product_id.as_uuid())
        .bind(&snapshot.name)
        .bind(snapshot.unit_price.minor())
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn snapshots(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, ProductSnapshot>, StoreError> {
        let uuids: Vec<Uuid> = ids.iter().copied().map(Uuid::from).collect();
        let rows = sqlx::query("SELECT id, name, unit_price FROM products WHERE id = ANY($1)")
            .bind(&uuids)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.iter()
            .map(|row| {
                let snapshot = ProductSnapshot {
                    product_id: ProductId::from_uuid(row.try_get("id").map_err(storage)?),
                    name: row.try_get("name").map_err(storage)?,
                    unit_price: Amount::from_minor(row.try_get("unit_price").map_err(storage)?),
                };
                Ok((snapshot.product_id, snapshot))
            })
            .collect()
    }
}
