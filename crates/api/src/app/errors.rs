//! Consistent JSON error responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use ffmarket_core::DomainError;
use ffmarket_infra::{CheckoutError, GatewayError, SettlementError, StoreError};
use ffmarket_scheduler::SchedulerError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// A body that fails to deserialize is a client mistake, same as any other
/// validation failure, so it answers 400 rather than axum's default 422.
pub fn body_rejection_to_response(rej: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", rej.body_text())
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::Unauthorized => {
            json_error(StatusCode::UNAUTHORIZED, "unauthorized", "unauthorized")
        }
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Storage(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

pub fn settlement_error_to_response(err: SettlementError) -> axum::response::Response {
    match err {
        SettlementError::Domain(e) => domain_error_to_response(e),
        SettlementError::Store(e) => store_error_to_response(e),
    }
}

pub fn checkout_error_to_response(err: CheckoutError) -> axum::response::Response {
    match err {
        CheckoutError::Domain(e) => domain_error_to_response(e),
        CheckoutError::Store(e) => store_error_to_response(e),
        CheckoutError::Gateway(e) => {
            let msg = match e {
                GatewayError::Rejected(m) | GatewayError::Unavailable(m) => m,
            };
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "gateway_error", msg)
        }
        CheckoutError::Inconsistent {
            order_id,
            order_number,
            detail,
        } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({
                "error": "order_inconsistent",
                "message": detail,
                "needsReconciliation": true,
                "orderId": order_id,
                "orderNumber": order_number,
            })),
        )
            .into_response(),
    }
}

pub fn scheduler_error_to_response(err: SchedulerError) -> axum::response::Response {
    match err {
        SchedulerError::UnknownJob(name) => {
            json_error(StatusCode::NOT_FOUND, "unknown_job", format!("unknown job: {name}"))
        }
        SchedulerError::Terminated => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "scheduler_unavailable",
            "scheduler is not running",
        ),
    }
}
