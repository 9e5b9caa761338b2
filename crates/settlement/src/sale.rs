//! Sale records: one commission-bearing transaction line per partner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ffmarket_core::{Amount, DomainError, DomainResult, PartnerId, PayoutId, SaleId};

/// Sale status lifecycle. Transitions only move forward:
/// pending → processing → completed → paid_out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Pending,
    Processing,
    Completed,
    PaidOut,
}

impl SaleStatus {
    fn rank(self) -> u8 {
        match self {
            SaleStatus::Pending => 0,
            SaleStatus::Processing => 1,
            SaleStatus::Completed => 2,
            SaleStatus::PaidOut => 3,
        }
    }

    /// Whether a transition to `next` is forward-only.
    pub fn can_advance_to(self, next: SaleStatus) -> bool {
        next.rank() > self.rank()
    }
}

/// A sale created by the order pipeline and consumed by the payout ledger.
///
/// Once `payout_id` is set the record is sealed: it never changes again and is
/// excluded from all future pending-balance computations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub partner_id: PartnerId,
    pub sale_amount: Amount,
    pub commission_amount: Amount,
    pub partner_payout_amount: Amount,
    pub status: SaleStatus,
    pub payout_id: Option<PayoutId>,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    pub fn new(
        partner_id: PartnerId,
        sale_amount: Amount,
        commission_amount: Amount,
        partner_payout_amount: Amount,
    ) -> Self {
        Self {
            id: SaleId::new(),
            partner_id,
            sale_amount,
            commission_amount,
            partner_payout_amount,
            status: SaleStatus::Pending,
            payout_id: None,
            created_at: Utc::now(),
        }
    }

    /// Completed and not yet attached to a payout.
    pub fn is_payable(&self) -> bool {
        self.status == SaleStatus::Completed && self.payout_id.is_none()
    }

    /// Advance the sale's status. Statuses never regress, and a sealed sale
    /// (non-null `payout_id`) never changes at all.
    pub fn advance(&mut self, next: SaleStatus) -> DomainResult<()> {
        if self.payout_id.is_some() {
            return Err(DomainError::conflict("sale is sealed by a payout"));
        }
        if !self.status.can_advance_to(next) {
            return Err(DomainError::conflict(format!(
                "sale status cannot regress from {:?} to {:?}",
                self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Seal the sale into a payout batch.
    pub fn attach_payout(&mut self, payout_id: PayoutId) -> DomainResult<()> {
        if !self.is_payable() {
            return Err(DomainError::conflict(
                "sale is not completed or already paid out",
            ));
        }
        self.status = SaleStatus::PaidOut;
        self.payout_id = Some(payout_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payable_sale(partner: PartnerId, payout: i64) -> Sale {
        let mut sale = Sale::new(
            partner,
            Amount::from_minor(payout * 2),
            Amount::from_minor(payout),
            Amount::from_minor(payout),
        );
        sale.status = SaleStatus::Completed;
        sale
    }

    #[test]
    fn status_never_regresses() {
        let mut sale = payable_sale(PartnerId::new(), 1000);
        let err = sale.advance(SaleStatus::Pending).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(sale.status, SaleStatus::Completed);
    }

    #[test]
    fn attach_payout_seals_the_sale() {
        let mut sale = payable_sale(PartnerId::new(), 1000);
        let payout_id = PayoutId::new();
        sale.attach_payout(payout_id).unwrap();

        assert_eq!(sale.status, SaleStatus::PaidOut);
        assert_eq!(sale.payout_id, Some(payout_id));
        assert!(!sale.is_payable());

        // Sealed: no further mutation of any kind.
        assert!(sale.advance(SaleStatus::PaidOut).is_err());
        assert!(sale.attach_payout(PayoutId::new()).is_err());
    }

    #[test]
    fn pending_sale_is_not_payable() {
        let sale = Sale::new(
            PartnerId::new(),
            Amount::from_minor(2000),
            Amount::from_minor(1000),
            Amount::from_minor(1000),
        );
        assert!(!sale.is_payable());
    }
}
