//! Job descriptors and the due computation.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// A named automation job with its endpoint and cadence.
///
/// The registry is a fixed enumerated set built at startup from configuration;
/// adding a job is a code/config change, not a runtime registration call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSpec {
    pub name: String,
    pub endpoint: String,
    pub interval_minutes: u32,
    pub enabled: bool,
}

impl JobSpec {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        interval_minutes: u32,
        enabled: bool,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            interval_minutes,
            enabled,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::minutes(i64::from(self.interval_minutes))
    }
}

/// Mutable per-job state, owned exclusively by the scheduler loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobState {
    /// Monotonically non-decreasing; set to the invocation time (not the
    /// completion time) when a run finishes, success or failure.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Overlap guard: at most one in-flight execution per job name.
    pub running: bool,
}

/// A job is due when it is enabled, not currently running, and either never
/// ran or its interval has fully elapsed since the last invocation.
pub fn is_due(spec: &JobSpec, state: &JobState, now: DateTime<Utc>) -> bool {
    if !spec.enabled || state.running {
        return false;
    }
    match state.last_run_at {
        None => true,
        Some(last) => now - last >= spec.interval(),
    }
}

/// Point-in-time view of one job for the status surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub name: String,
    pub endpoint: String,
    pub interval_minutes: u32,
    pub last_run_at: Option<DateTime<Utc>>,
    pub enabled: bool,
    pub running: bool,
}

impl JobSnapshot {
    pub fn of(spec: &JobSpec, state: &JobState) -> Self {
        Self {
            name: spec.name.clone(),
            endpoint: spec.endpoint.clone(),
            interval_minutes: spec.interval_minutes,
            last_run_at: state.last_run_at,
            enabled: spec.enabled,
            running: state.running,
        }
    }
}
