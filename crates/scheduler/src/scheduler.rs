//! The scheduler control loop.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::invoker::{InvokeError, TaskInvoker};
use crate::registry::{is_due, JobSnapshot, JobSpec, JobState};

/// Wall-clock tick period of the loop.
pub const DEFAULT_TICK_PERIOD: StdDuration = StdDuration::from_secs(60);

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("unknown job: {0}")]
    UnknownJob(String),

    /// The loop task has shut down; no further commands can be served.
    #[error("scheduler terminated")]
    Terminated,
}

/// Result of a manual trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunNowOutcome {
    /// The named job (or each due job, for a registry-wide trigger) was
    /// started.
    Triggered(usize),
    /// The named job is already running; the overlap guard made this a no-op.
    AlreadyRunning,
}

/// Point-in-time view of the whole scheduler.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub server_time: DateTime<Utc>,
    pub jobs: Vec<JobSnapshot>,
}

enum Command {
    Start(oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
    RunNow {
        job: Option<String>,
        reply: oneshot::Sender<Result<RunNowOutcome, SchedulerError>>,
    },
    Status(oneshot::Sender<SchedulerStatus>),
}

struct Finished {
    index: usize,
    invoked_at: DateTime<Utc>,
}

/// Cloneable handle to the scheduler loop. All methods post a command into
/// the loop's channel, so control calls are serialized with ticks and never
/// race against them.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Command>,
}

impl SchedulerHandle {
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Start(reply))
            .await
            .map_err(|_| SchedulerError::Terminated)?;
        rx.await.map_err(|_| SchedulerError::Terminated)
    }

    pub async fn stop(&self) -> Result<(), SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Stop(reply))
            .await
            .map_err(|_| SchedulerError::Terminated)?;
        rx.await.map_err(|_| SchedulerError::Terminated)
    }

    /// Manual trigger. With a job name, bypasses the due check but honors the
    /// overlap guard; without one, performs an immediate tick (all due jobs).
    pub async fn run_now(&self, job: Option<&str>) -> Result<RunNowOutcome, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::RunNow {
                job: job.map(str::to_string),
                reply,
            })
            .await
            .map_err(|_| SchedulerError::Terminated)?;
        rx.await.map_err(|_| SchedulerError::Terminated)?
    }

    pub async fn status(&self) -> Result<SchedulerStatus, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Status(reply))
            .await
            .map_err(|_| SchedulerError::Terminated)?;
        rx.await.map_err(|_| SchedulerError::Terminated)
    }
}

/// The loop itself: exclusive owner of all job state.
pub struct Scheduler {
    specs: Vec<JobSpec>,
    states: Vec<JobState>,
    invoker: Arc<dyn TaskInvoker>,
    ticking: bool,
    done_tx: mpsc::UnboundedSender<Finished>,
}

/// Spawn the scheduler loop onto the current tokio runtime.
///
/// The loop starts in the stopped state; call [`SchedulerHandle::start`] to
/// begin ticking.
pub fn spawn(
    specs: Vec<JobSpec>,
    invoker: Arc<dyn TaskInvoker>,
    tick_period: StdDuration,
) -> SchedulerHandle {
    let (tx, cmd_rx) = mpsc::channel(32);
    let (done_tx, done_rx) = mpsc::unbounded_channel();

    let states = vec![JobState::default(); specs.len()];
    let scheduler = Scheduler {
        specs,
        states,
        invoker,
        ticking: false,
        done_tx,
    };

    tokio::spawn(scheduler.run(cmd_rx, done_rx, tick_period));

    SchedulerHandle { tx }
}

impl Scheduler {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut done_rx: mpsc::UnboundedReceiver<Finished>,
        tick_period: StdDuration,
    ) {
        info!(jobs = self.specs.len(), "scheduler loop started");
        let mut ticker = tokio::time::interval(tick_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Consume the immediate first tick so ticking starts one period in.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.ticking {
                        self.tick(Utc::now());
                    }
                }
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd),
                        // All handles dropped: shut down.
                        None => break,
                    }
                }
                Some(done) = done_rx.recv() => {
                    self.finish(done);
                }
            }
        }

        info!("scheduler loop stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start(reply) => {
                if !self.ticking {
                    info!("scheduler started");
                }
                self.ticking = true;
                let _ = reply.send(());
            }
            Command::Stop(reply) => {
                if self.ticking {
                    info!("scheduler stopped");
                }
                self.ticking = false;
                let _ = reply.send(());
            }
            Command::RunNow { job, reply } => {
                let result = self.run_now(job, Utc::now());
                let _ = reply.send(result);
            }
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
        }
    }

    fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            is_running: self.ticking,
            server_time: Utc::now(),
            jobs: self
                .specs
                .iter()
                .zip(&self.states)
                .map(|(spec, state)| JobSnapshot::of(spec, state))
                .collect(),
        }
    }

    /// Trigger every due job, in registration order.
    fn tick(&mut self, now: DateTime<Utc>) -> usize {
        let due: Vec<usize> = self
            .specs
            .iter()
            .zip(&self.states)
            .enumerate()
            .filter(|(_, (spec, state))| is_due(spec, state, now))
            .map(|(i, _)| i)
            .collect();

        for &index in &due {
            self.trigger(index, now);
        }
        due.len()
    }

    fn run_now(
        &mut self,
        job: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<RunNowOutcome, SchedulerError> {
        match job {
            Some(name) => {
                let index = self
                    .specs
                    .iter()
                    .position(|s| s.name == name)
                    .ok_or_else(|| SchedulerError::UnknownJob(name.clone()))?;
                if self.states[index].running {
                    warn!(job = %name, "manual trigger skipped: job already running");
                    return Ok(RunNowOutcome::AlreadyRunning);
                }
                self.trigger(index, now);
                Ok(RunNowOutcome::Triggered(1))
            }
            None => Ok(RunNowOutcome::Triggered(self.tick(now))),
        }
    }

    /// Start one invocation. The loop never awaits it; completion comes back
    /// as a message carrying the invocation time.
    fn trigger(&mut self, index: usize, invoked_at: DateTime<Utc>) {
        let state = &mut self.states[index];
        debug_assert!(!state.running);
        state.running = true;

        let spec = self.specs[index].clone();
        let invoker = Arc::clone(&self.invoker);
        let done_tx = self.done_tx.clone();

        info!(job = %spec.name, endpoint = %spec.endpoint, "job triggered");

        tokio::spawn(async move {
            match invoker.invoke(&spec.endpoint).await {
                Ok(report) if report.success => {
                    info!(job = %spec.name, data = %report.data, "job completed");
                }
                Ok(report) => {
                    warn!(job = %spec.name, data = %report.data, "job reported failure");
                }
                Err(InvokeError::Unauthorized) => {
                    // Misconfigured shared secret: flagged distinctly for the
                    // operator, still non-fatal to the loop.
                    error!(job = %spec.name, "job rejected: shared secret misconfigured");
                }
                Err(e) => {
                    warn!(job = %spec.name, error = %e, "job invocation failed");
                }
            }

            // last_run_at advances to the invocation time whether the call
            // succeeded or failed, so a fast-failing endpoint waits out its
            // full interval instead of being re-invoked every tick.
            let _ = done_tx.send(Finished { index, invoked_at });
        });
    }

    fn finish(&mut self, done: Finished) {
        let state = &mut self.states[done.index];
        state.running = false;
        // last_run_at is monotonically non-decreasing.
        if state.last_run_at.is_none_or(|prev| done.invoked_at > prev) {
            state.last_run_at = Some(done.invoked_at);
        }
    }
}
