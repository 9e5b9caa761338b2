//! HTTP application wiring (axum router + service wiring).

use std::sync::Arc;

use axum::{routing::get, Extension, Router};

use crate::middleware::{self, SecretState};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// black-box tests).
///
/// Checkout and health are public; cron, payout, and task routes sit behind
/// the shared-secret guard.
pub fn build_app(services: Arc<AppServices>, secret: String) -> Router {
    let secret_state = SecretState { secret };

    let gated = Router::new()
        .nest("/api/cron", routes::cron::router())
        .nest("/api/payouts", routes::payouts::router())
        .nest("/api/tasks", routes::tasks::router())
        .layer(axum::middleware::from_fn_with_state(
            secret_state,
            middleware::secret_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api/checkout", routes::checkout::router())
        .merge(gated)
        .layer(Extension(services))
}
