//! Settlement service: pending-payout views and payout processing.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use ffmarket_core::{Amount, DomainError, PartnerId, SaleId};
use ffmarket_settlement::{
    due_partners, next_payout_date, pending_balance, validate_batch, PartnerBalance, Payout,
    PayoutMethod, DEFAULT_PAYOUT_THRESHOLD,
};

use crate::store::{PayoutStore, SalesStore, StoreError};

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A processed payout and the number of sales it sealed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutReceipt {
    pub payout: Payout,
    pub sales_updated: usize,
}

/// Per-partner settlement view: what is owed and when it would next be paid.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerSummary {
    pub partner_id: PartnerId,
    pub pending_balance: Amount,
    pub pending_sales: usize,
    pub total_paid_out: Amount,
    pub next_payout_date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPayoutRequest {
    pub partner_id: PartnerId,
    pub sale_ids: Vec<SaleId>,
    pub amount: Amount,
    #[serde(default)]
    pub method: PayoutMethod,
    #[serde(default)]
    pub reference: Option<String>,
}

pub struct SettlementService {
    sales: Arc<dyn SalesStore>,
    payouts: Arc<dyn PayoutStore>,
    threshold: Amount,
}

impl SettlementService {
    pub fn new(sales: Arc<dyn SalesStore>, payouts: Arc<dyn PayoutStore>) -> Self {
        Self {
            sales,
            payouts,
            threshold: DEFAULT_PAYOUT_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: Amount) -> Self {
        self.threshold = threshold;
        self
    }

    /// Partners whose pending balance has reached the threshold, with the
    /// sale ids making up each balance.
    pub async fn due_partners(&self) -> Result<Vec<PartnerBalance>, SettlementError> {
        let payable = self.sales.payable_sales().await?;
        Ok(due_partners(&payable, self.threshold)?)
    }

    pub async fn partner_summary(
        &self,
        partner_id: PartnerId,
        today: NaiveDate,
    ) -> Result<PartnerSummary, SettlementError> {
        let sales = self.sales.sales_for_partner(partner_id).await?;
        let pending: Vec<_> = sales.iter().filter(|s| s.is_payable()).cloned().collect();
        let balance = pending_balance(&pending, partner_id)?;

        let payouts = self.payouts.payouts_for_partner(partner_id).await?;
        let total_paid_out =
            Amount::checked_sum(payouts.iter().map(|p| p.amount).collect::<Vec<_>>())?;

        Ok(PartnerSummary {
            partner_id,
            pending_balance: balance,
            pending_sales: pending.len(),
            total_paid_out,
            next_payout_date: next_payout_date(today),
        })
    }

    /// Disburse one validated batch.
    ///
    /// Validation runs against a fresh read of the batch; the store then
    /// re-checks attachment with a conditional write, so a payout racing this
    /// one turns into a conflict instead of a double payment. The threshold is
    /// deliberately not enforced here: an explicit request may settle a small
    /// balance.
    pub async fn process_payout(
        &self,
        request: ProcessPayoutRequest,
    ) -> Result<PayoutReceipt, SettlementError> {
        let resolved = self.sales.sales_by_ids(&request.sale_ids).await?;
        validate_batch(
            &resolved,
            request.partner_id,
            &request.sale_ids,
            request.amount,
        )?;

        let payout = Payout::new(
            request.partner_id,
            request.amount,
            request.method,
            request.reference,
        );
        let payout_id = payout.id;

        let sales_updated = match self.payouts.commit_payout(payout.clone(), &request.sale_ids).await {
            Ok(n) => n,
            Err(e) => {
                warn!(
                    partner_id = %request.partner_id,
                    payout_id = %payout_id,
                    error = %e,
                    "payout commit aborted"
                );
                return Err(e.into());
            }
        };

        info!(
            partner_id = %request.partner_id,
            payout_id = %payout_id,
            amount = %request.amount,
            sales_updated,
            "payout processed"
        );

        Ok(PayoutReceipt {
            payout,
            sales_updated,
        })
    }
}
