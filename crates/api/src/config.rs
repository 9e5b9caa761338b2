//! Environment configuration for the API binary.

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address for the HTTP listener.
    pub bind_addr: String,
    /// Shared secret gating the cron/payout/task routes.
    pub secret: String,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let secret = std::env::var("CRON_SECRET").unwrap_or_else(|_| {
            tracing::warn!("CRON_SECRET not set; using insecure dev default");
            "dev-secret".to_string()
        });

        Self { bind_addr, secret }
    }
}
