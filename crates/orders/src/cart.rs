//! Cart pricing: authoritative totals from server-held prices.

use serde::{Deserialize, Serialize};

use ffmarket_core::{Amount, DomainError, DomainResult, ProductId};

/// One cart line as submitted by the checkout client.
///
/// `claimed_unit_price` is whatever the client displayed; it never enters any
/// computation and exists only so tampering can be detected and logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_unit_price: Option<Amount>,
}

/// Server-held product facts captured at pricing time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Amount,
}

/// A cart line priced against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedLine {
    pub snapshot: ProductSnapshot,
    pub quantity: u32,
    pub size: Option<String>,
    pub line_total: Amount,
}

/// Shipping policy constants for checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutPolicy {
    pub free_shipping_threshold: Amount,
    pub flat_shipping_fee: Amount,
}

impl Default for CheckoutPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Amount::from_minor(20000),
            flat_shipping_fee: Amount::from_minor(1500),
        }
    }
}

/// An authoritative server-computed quote. Tax is fixed at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub subtotal: Amount,
    pub shipping: Amount,
    pub tax: Amount,
    pub total: Amount,
    pub lines: Vec<PricedLine>,
}

/// Price a cart against catalog snapshots.
///
/// Each cart line must be pre-resolved to its snapshot (catalog lookup is an
/// infra concern). Every line is priced from `snapshot.unit_price` alone;
/// `claimed_unit_price` is left to the caller to compare for tamper logging.
pub fn price_cart(lines: &[(CartLine, ProductSnapshot)], policy: CheckoutPolicy) -> DomainResult<Quote> {
    if lines.is_empty() {
        return Err(DomainError::validation("cart must not be empty"));
    }

    let mut priced = Vec::with_capacity(lines.len());
    let mut subtotal = Amount::ZERO;

    for (line, snapshot) in lines {
        if line.product_id != snapshot.product_id {
            return Err(DomainError::validation(
                "cart line resolved against the wrong product",
            ));
        }
        if line.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if snapshot.unit_price <= Amount::ZERO {
            return Err(DomainError::validation("catalog price must be positive"));
        }

        let line_total = snapshot.unit_price.checked_mul_qty(line.quantity)?;
        subtotal = subtotal.checked_add(line_total)?;
        priced.push(PricedLine {
            snapshot: snapshot.clone(),
            quantity: line.quantity,
            size: line.size.clone(),
            line_total,
        });
    }

    let shipping = if subtotal >= policy.free_shipping_threshold {
        Amount::ZERO
    } else {
        policy.flat_shipping_fee
    };
    let total = subtotal.checked_add(shipping)?;

    Ok(Quote {
        subtotal,
        shipping,
        tax: Amount::ZERO,
        total,
        lines: priced,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: ProductId, quantity: u32) -> CartLine {
        CartLine {
            product_id,
            quantity,
            size: None,
            claimed_unit_price: None,
        }
    }

    fn snapshot(product_id: ProductId, unit_price: i64) -> ProductSnapshot {
        ProductSnapshot {
            product_id,
            name: "Linen Shirt".to_string(),
            unit_price: Amount::from_minor(unit_price),
        }
    }

    #[test]
    fn quote_below_threshold_charges_flat_shipping() {
        let a = ProductId::new();
        let b = ProductId::new();
        let quote = price_cart(
            &[(line(a, 2), snapshot(a, 5000)), (line(b, 1), snapshot(b, 3000))],
            CheckoutPolicy::default(),
        )
        .unwrap();

        assert_eq!(quote.subtotal, Amount::from_minor(13000));
        assert_eq!(quote.shipping, Amount::from_minor(1500));
        assert_eq!(quote.tax, Amount::ZERO);
        assert_eq!(quote.total, Amount::from_minor(14500));
    }

    #[test]
    fn quote_at_threshold_ships_free() {
        let a = ProductId::new();
        let quote = price_cart(
            &[(line(a, 2), snapshot(a, 10000))],
            CheckoutPolicy::default(),
        )
        .unwrap();

        assert_eq!(quote.subtotal, Amount::from_minor(20000));
        assert_eq!(quote.shipping, Amount::ZERO);
        assert_eq!(quote.total, Amount::from_minor(20000));
    }

    #[test]
    fn client_price_never_enters_the_computation() {
        let a = ProductId::new();
        let mut tampered = line(a, 1);
        tampered.claimed_unit_price = Some(Amount::from_minor(1));

        let quote = price_cart(&[(tampered, snapshot(a, 5000))], CheckoutPolicy::default()).unwrap();
        assert_eq!(quote.subtotal, Amount::from_minor(5000));
    }

    #[test]
    fn empty_cart_is_rejected() {
        let err = price_cart(&[], CheckoutPolicy::default()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let a = ProductId::new();
        let err = price_cart(&[(line(a, 0), snapshot(a, 5000))], CheckoutPolicy::default())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn mismatched_snapshot_is_rejected() {
        let a = ProductId::new();
        let err = price_cart(
            &[(line(a, 1), snapshot(ProductId::new(), 5000))],
            CheckoutPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
