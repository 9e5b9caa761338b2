//! Public checkout surface.
//!
//! Totals in the request body are treated as untrusted display values; every
//! amount that matters is recomputed from the catalog.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::json;

use ffmarket_infra::CreateOrderRequest;

use crate::app::errors::{body_rejection_to_response, checkout_error_to_response};
use crate::app::{dto, AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/payment-intent", post(payment_intent))
        .route("/create-order", post(create_order))
}

async fn payment_intent(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::PaymentIntentRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(v) => v,
        Err(rej) => return body_rejection_to_response(rej),
    };

    match services.checkout.create_payment_intent(&body.items).await {
        Ok((intent, quote)) => (
            StatusCode::OK,
            Json(json!({
                "clientSecret": intent.client_secret,
                "subtotal": quote.subtotal,
                "shipping": quote.shipping,
                "total": quote.total,
            })),
        )
            .into_response(),
        Err(e) => checkout_error_to_response(e),
    }
}

async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateOrderBody>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(v) => v,
        Err(rej) => return body_rejection_to_response(rej),
    };

    let request = CreateOrderRequest {
        email: body.email,
        shipping_address: body.shipping_address,
        lines: body.items,
        payment_intent_id: body.payment_intent_id,
        claimed_subtotal: body.subtotal,
        claimed_shipping: body.shipping,
        claimed_total: body.total,
    };

    match services.checkout.create_order(request).await {
        Ok(order) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "orderId": order.id,
                "orderNumber": order.order_number,
            })),
        )
            .into_response(),
        Err(e) => checkout_error_to_response(e),
    }
}
