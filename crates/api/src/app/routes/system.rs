use axum::{http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

pub async fn health() -> axum::response::Response {
    (
        StatusCode::OK,
        Json(json!({"status": "ok", "time": Utc::now()})),
    )
        .into_response()
}
