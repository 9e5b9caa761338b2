//! `ffmarket-api` — HTTP surface for the marketplace core.
//!
//! Folder map:
//! - `app/services.rs`: infrastructure wiring (stores, services, scheduler)
//! - `app/routes/`: HTTP routes + handlers (one file per surface)
//! - `app/dto.rs`: wire DTOs and JSON mapping helpers
//! - `app/errors.rs`: consistent error responses
//! - `middleware.rs`: shared-secret guard for operational routes
//! - `config.rs`: environment configuration

pub mod app;
pub mod config;
pub mod middleware;
