//! Payout batches: settlement records and batch validation.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ffmarket_core::{Amount, DomainError, DomainResult, PartnerId, PayoutId, SaleId};

use crate::sale::Sale;

/// Disbursement method.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutMethod {
    #[default]
    BankTransfer,
    Paypal,
}

/// Payout record status. A payout row is written exactly once per settlement
/// batch, after the batch has been validated, so it is only ever recorded as
/// completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Completed,
}

/// One settlement batch disbursing a partner's aggregated balance.
///
/// Append-only: payouts are never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub id: PayoutId,
    pub partner_id: PartnerId,
    pub amount: Amount,
    pub status: PayoutStatus,
    pub method: PayoutMethod,
    pub reference: Option<String>,
    pub processed_at: DateTime<Utc>,
}

impl Payout {
    pub fn new(
        partner_id: PartnerId,
        amount: Amount,
        method: PayoutMethod,
        reference: Option<String>,
    ) -> Self {
        Self {
            id: PayoutId::new(),
            partner_id,
            amount,
            status: PayoutStatus::Completed,
            method,
            reference,
            processed_at: Utc::now(),
        }
    }
}

/// Validate a payout batch before any mutation.
///
/// Every requested sale must exist, belong to the partner, be completed, and
/// be unattached; the requested amount must equal the batch sum. Any failure
/// rejects the whole call with zero mutations (the storage layer additionally
/// re-checks attachment with a conditional write, so a concurrent winner turns
/// the loser's commit into a conflict rather than a double payment).
pub fn validate_batch(
    resolved: &HashMap<SaleId, Sale>,
    partner_id: PartnerId,
    sale_ids: &[SaleId],
    amount: Amount,
) -> DomainResult<()> {
    if sale_ids.is_empty() {
        return Err(DomainError::validation("saleIds must not be empty"));
    }
    if amount <= Amount::ZERO {
        return Err(DomainError::validation("amount must be positive"));
    }

    let mut seen = HashSet::with_capacity(sale_ids.len());
    let mut batch_total = Amount::ZERO;
    for id in sale_ids {
        if !seen.insert(*id) {
            return Err(DomainError::validation(format!(
                "sale {id} is listed more than once"
            )));
        }
        let sale = resolved.get(id).ok_or(DomainError::NotFound)?;
        if sale.partner_id != partner_id {
            return Err(DomainError::conflict(format!(
                "sale {id} belongs to a different partner"
            )));
        }
        if sale.payout_id.is_some() {
            return Err(DomainError::conflict(format!(
                "sale {id} is already attached to a payout"
            )));
        }
        if !sale.is_payable() {
            return Err(DomainError::conflict(format!("sale {id} is not completed")));
        }
        batch_total = batch_total.checked_add(sale.partner_payout_amount)?;
    }

    if batch_total != amount {
        return Err(DomainError::validation(format!(
            "amount {amount} does not match batch total {batch_total}"
        )));
    }

    Ok(())
}
