use std::sync::Arc;

use anyhow::Context;

use ffmarket_api::app;
use ffmarket_api::config::ApiConfig;
use ffmarket_infra::InMemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ffmarket_observability::init();

    let config = ApiConfig::from_env();

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    let addr = listener
        .local_addr()
        .context("listener has no local addr")?;

    // The scheduler calls back into this process's own task endpoints.
    let base_url = format!("http://127.0.0.1:{}", addr.port());
    let store = Arc::new(InMemoryStore::new());
    let services = Arc::new(app::services::build_services(
        store,
        &base_url,
        &config.secret,
    )?);

    services
        .scheduler
        .start()
        .await
        .context("scheduler failed to start")?;

    let router = app::build_app(services, config.secret.clone());

    tracing::info!("listening on {addr}");
    axum::serve(listener, router)
        .await
        .context("server failed")?;
    Ok(())
}
