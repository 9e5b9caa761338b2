//! `ffmarket-scheduler` — timer loop for named automation jobs.
//!
//! A single control loop owns the job registry and all per-job state. Every
//! mutation — ticks, manual triggers, start/stop, completion bookkeeping —
//! flows through the loop's command channel, so there is exactly one writer
//! and no shared-state locking. Job invocations themselves are spawned and
//! never block the loop.

pub mod invoker;
pub mod registry;
pub mod scheduler;

pub use invoker::{HttpTaskInvoker, InvokeError, TaskInvoker, TaskReport};
pub use registry::{is_due, JobSnapshot, JobSpec, JobState};
pub use scheduler::{
    spawn, RunNowOutcome, Scheduler, SchedulerError, SchedulerHandle, SchedulerStatus,
    DEFAULT_TICK_PERIOD,
};
