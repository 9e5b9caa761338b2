//! Wire DTOs. All JSON fields are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ffmarket_core::Amount;
use ffmarket_orders::{CartLine, ShippingAddress};
use ffmarket_scheduler::JobSnapshot;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJob {
    pub name: String,
    pub endpoint: String,
    pub schedule: String,
    pub last_run: Option<DateTime<Utc>>,
    pub enabled: bool,
    pub running: bool,
}

impl From<JobSnapshot> for CronJob {
    fn from(snapshot: JobSnapshot) -> Self {
        Self {
            name: snapshot.name,
            endpoint: snapshot.endpoint,
            schedule: format!("every {} minutes", snapshot.interval_minutes),
            last_run: snapshot.last_run_at,
            enabled: snapshot.enabled,
            running: snapshot.running,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronAction {
    pub action: String,
    #[serde(default)]
    pub job: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    pub items: Vec<CartLine>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    pub email: String,
    pub shipping_address: ShippingAddress,
    pub items: Vec<CartLine>,
    pub payment_intent_id: String,
    pub subtotal: Amount,
    pub shipping: Amount,
    pub total: Amount,
}
