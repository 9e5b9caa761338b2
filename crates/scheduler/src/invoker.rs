//! Task endpoint invocation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Result body reported by a task endpoint: `{success, data: {...counts}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskReport {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Default for TaskReport {
    fn default() -> Self {
        Self {
            success: true,
            data: serde_json::Value::Null,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Invocation failure. All variants are logged by the scheduler and none stop
/// the loop; the job's own cadence provides the retry.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// Shared secret rejected by the endpoint. A configuration error, logged
    /// distinctly for operator attention.
    #[error("task endpoint rejected the shared secret")]
    Unauthorized,

    #[error("task endpoint returned status {0}")]
    Status(u16),

    /// The bounded per-call timeout elapsed.
    #[error("task endpoint call timed out")]
    Timeout,

    #[error("task endpoint call failed: {0}")]
    Transport(String),
}

/// Port for calling task endpoints. The scheduler treats endpoints as opaque.
#[async_trait]
pub trait TaskInvoker: Send + Sync + 'static {
    async fn invoke(&self, endpoint: &str) -> Result<TaskReport, InvokeError>;
}

/// HTTP invoker: POSTs `{base_url}{endpoint}?secret=S` with the shared secret
/// also in the `x-cron-secret` header.
pub struct HttpTaskInvoker {
    client: reqwest::Client,
    base_url: String,
    secret: String,
}

impl HttpTaskInvoker {
    /// `call_timeout` bounds every invocation; a hung endpoint becomes a
    /// `Timeout` error instead of wedging its job's `running` flag forever.
    /// A client that cannot be built is refused outright rather than swapped
    /// for one without the timeout.
    pub fn new(
        base_url: impl Into<String>,
        secret: impl Into<String>,
        call_timeout: Duration,
    ) -> Result<Self, InvokeError> {
        let client = reqwest::Client::builder()
            .timeout(call_timeout)
            .build()
            .map_err(|e| InvokeError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            secret: secret.into(),
        })
    }
}

#[async_trait]
impl TaskInvoker for HttpTaskInvoker {
    async fn invoke(&self, endpoint: &str) -> Result<TaskReport, InvokeError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .query(&[("secret", self.secret.as_str())])
            .header("x-cron-secret", self.secret.as_str())
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InvokeError::Timeout
                } else {
                    InvokeError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(InvokeError::Unauthorized);
        }
        if !status.is_success() {
            return Err(InvokeError::Status(status.as_u16()));
        }

        // Tolerate endpoints that return no JSON body at all.
        Ok(response.json::<TaskReport>().await.unwrap_or_default())
    }
}
