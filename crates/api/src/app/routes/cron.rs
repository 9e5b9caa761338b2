//! Scheduler control surface.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use ffmarket_scheduler::RunNowOutcome;

use crate::app::errors::{body_rejection_to_response, json_error, scheduler_error_to_response};
use crate::app::{dto, AppServices};

pub fn router() -> Router {
    Router::new().route("/status", get(status).post(control))
}

async fn status(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let status = match services.scheduler.status().await {
        Ok(s) => s,
        Err(e) => return scheduler_error_to_response(e),
    };

    let jobs: Vec<dto::CronJob> = status.jobs.into_iter().map(Into::into).collect();
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": {
                "jobs": jobs,
                "isRunning": status.is_running,
                "serverTime": status.server_time,
                "timezone": "UTC",
            }
        })),
    )
        .into_response()
}

async fn control(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CronAction>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(v) => v,
        Err(rej) => return body_rejection_to_response(rej),
    };

    match body.action.as_str() {
        "start" => match services.scheduler.start().await {
            Ok(()) => success("scheduler started"),
            Err(e) => scheduler_error_to_response(e),
        },
        "stop" => match services.scheduler.stop().await {
            Ok(()) => success("scheduler stopped"),
            Err(e) => scheduler_error_to_response(e),
        },
        "run-now" => match services.scheduler.run_now(body.job.as_deref()).await {
            Ok(RunNowOutcome::Triggered(n)) => success(format!("{n} job(s) triggered")),
            Ok(RunNowOutcome::AlreadyRunning) => json_error(
                StatusCode::CONFLICT,
                "conflict",
                "job is already running",
            ),
            Err(e) => scheduler_error_to_response(e),
        },
        other => json_error(
            StatusCode::BAD_REQUEST,
            "invalid_action",
            format!("unknown action '{other}'; expected start, stop, or run-now"),
        ),
    }
}

fn success(message: impl Into<String>) -> axum::response::Response {
    (
        StatusCode::OK,
        Json(json!({"success": true, "message": message.into()})),
    )
        .into_response()
}
