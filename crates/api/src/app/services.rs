//! Infrastructure wiring: stores, domain services, and the scheduler.

use std::sync::Arc;
use std::time::Duration;

use ffmarket_infra::{
    CheckoutService, FakePaymentGateway, InMemoryStore, SettlementService,
};
use ffmarket_scheduler::{HttpTaskInvoker, JobSpec, SchedulerHandle, TaskInvoker};

/// Everything the handlers need, injected via `Extension`.
pub struct AppServices {
    pub settlement: SettlementService,
    pub checkout: CheckoutService,
    pub scheduler: SchedulerHandle,
}

/// The automation registry. Fixed at startup; adding a job is a code change.
pub fn job_registry() -> Vec<JobSpec> {
    vec![
        JobSpec::new("order-sweep", "/api/tasks/order-sweep", 15, true),
        JobSpec::new("settlement-report", "/api/tasks/settlement-report", 60, true),
    ]
}

/// Build the services on in-memory storage, with the scheduler's HTTP
/// invoker pointed at `base_url` (normally this process's own listener).
pub fn build_services(
    store: Arc<InMemoryStore>,
    base_url: &str,
    secret: &str,
) -> anyhow::Result<AppServices> {
    let invoker: Arc<dyn TaskInvoker> = Arc::new(HttpTaskInvoker::new(
        base_url,
        secret,
        Duration::from_secs(30),
    )?);
    Ok(build_services_with_invoker(store, invoker))
}

pub fn build_services_with_invoker(
    store: Arc<InMemoryStore>,
    invoker: Arc<dyn TaskInvoker>,
) -> AppServices {
    let settlement = SettlementService::new(store.clone(), store.clone());
    let checkout = CheckoutService::new(
        store.clone(),
        store,
        Arc::new(FakePaymentGateway::new()),
    );
    let scheduler = ffmarket_scheduler::spawn(
        job_registry(),
        invoker,
        ffmarket_scheduler::DEFAULT_TICK_PERIOD,
    );

    AppServices {
        settlement,
        checkout,
        scheduler,
    }
}
