//! Partner settlement surface.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use ffmarket_core::PartnerId;
use ffmarket_infra::ProcessPayoutRequest;

use crate::app::errors::{body_rejection_to_response, json_error, settlement_error_to_response};
use crate::app::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/pending", get(pending))
        .route("/partners/:id/summary", get(partner_summary))
        .route("/process", post(process))
}

async fn pending(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.settlement.due_partners().await {
        Ok(due) => (
            StatusCode::OK,
            Json(json!({"success": true, "data": due})),
        )
            .into_response(),
        Err(e) => settlement_error_to_response(e),
    }
}

async fn partner_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let partner_id: PartnerId = match id.parse() {
        Ok(v) => v,
        Err(_) => return json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid partner id"),
    };

    match services
        .settlement
        .partner_summary(partner_id, Utc::now().date_naive())
        .await
    {
        Ok(summary) => (
            StatusCode::OK,
            Json(json!({"success": true, "data": summary})),
        )
            .into_response(),
        Err(e) => settlement_error_to_response(e),
    }
}

async fn process(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<ProcessPayoutRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(v) => v,
        Err(rej) => return body_rejection_to_response(rej),
    };

    match services.settlement.process_payout(body).await {
        Ok(receipt) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "payout": receipt.payout,
                "salesUpdated": receipt.sales_updated,
            })),
        )
            .into_response(),
        Err(e) => settlement_error_to_response(e),
    }
}
