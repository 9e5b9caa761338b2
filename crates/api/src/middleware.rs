//! Shared-secret guard for operational routes.
//!
//! The secret is accepted either as a `secret` query parameter or an
//! `x-cron-secret` header (the scheduler's HTTP invoker sends both). The
//! check runs before any handler, so a bad secret can never cause a side
//! effect.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    middleware::Next,
    response::Response,
};

use crate::app::errors::json_error;

#[derive(Clone)]
pub struct SecretState {
    pub secret: String,
}

pub async fn secret_middleware(
    State(state): State<SecretState>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let presented = header_secret(req.headers()).or_else(|| query_secret(req.uri()));

    match presented {
        Some(s) if s == state.secret => Ok(next.run(req).await),
        _ => Err(json_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid secret",
        )),
    }
}

fn header_secret(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-cron-secret")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn query_secret(uri: &Uri) -> Option<String> {
    uri.query()?
        .split('&')
        .find_map(|pair| pair.strip_prefix("secret=").map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_secret_is_extracted() {
        let uri: Uri = "/api/cron/status?secret=s3cret".parse().unwrap();
        assert_eq!(query_secret(&uri).as_deref(), Some("s3cret"));
    }

    #[test]
    fn missing_query_secret_is_none() {
        let uri: Uri = "/api/cron/status?other=1".parse().unwrap();
        assert_eq!(query_secret(&uri), None);
    }
}
