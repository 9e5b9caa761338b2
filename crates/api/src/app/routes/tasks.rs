//! Task endpoints invoked by the scheduler (and by operators directly).
//!
//! Each returns `{success, data: {...counts}}` so the scheduler can log the
//! outcome of the run.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use ffmarket_core::Amount;

use crate::app::errors::{checkout_error_to_response, settlement_error_to_response};
use crate::app::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/order-sweep", post(order_sweep))
        .route("/settlement-report", post(settlement_report))
}

async fn order_sweep(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.checkout.sweep_stale_orders(Utc::now()).await {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({"success": true, "data": report})),
        )
            .into_response(),
        Err(e) => checkout_error_to_response(e),
    }
}

async fn settlement_report(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let due = match services.settlement.due_partners().await {
        Ok(d) => d,
        Err(e) => return settlement_error_to_response(e),
    };

    let total_due = match Amount::checked_sum(due.iter().map(|p| p.balance)) {
        Ok(t) => t,
        Err(e) => {
            return settlement_error_to_response(ffmarket_infra::SettlementError::Domain(e))
        }
    };

    info!(
        due_partners = due.len(),
        total_due = %total_due,
        "settlement report generated"
    );

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": {
                "duePartners": due.len(),
                "totalDue": total_due,
            }
        })),
    )
        .into_response()
}
