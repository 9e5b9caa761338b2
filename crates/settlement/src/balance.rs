//! Pending-balance aggregation over sale records.

use std::collections::BTreeMap;

use serde::Serialize;

use ffmarket_core::{Amount, DomainResult, PartnerId, SaleId};

use crate::sale::Sale;

/// A partner's aggregated unpaid balance and the sales composing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerBalance {
    pub partner_id: PartnerId,
    pub balance: Amount,
    pub sale_ids: Vec<SaleId>,
}

/// Sum of `partner_payout_amount` over completed, unattached sales for one
/// partner.
pub fn pending_balance(sales: &[Sale], partner_id: PartnerId) -> DomainResult<Amount> {
    Amount::checked_sum(
        sales
            .iter()
            .filter(|s| s.partner_id == partner_id && s.is_payable())
            .map(|s| s.partner_payout_amount),
    )
}

/// All partners whose pending balance meets `threshold`, with the sale ids
/// backing each balance. Ordered by partner id for deterministic output.
pub fn due_partners(sales: &[Sale], threshold: Amount) -> DomainResult<Vec<PartnerBalance>> {
    let mut by_partner: BTreeMap<PartnerId, PartnerBalance> = BTreeMap::new();

    for sale in sales.iter().filter(|s| s.is_payable()) {
        let entry = by_partner
            .entry(sale.partner_id)
            .or_insert_with(|| PartnerBalance {
                partner_id: sale.partner_id,
                balance: Amount::ZERO,
                sale_ids: Vec::new(),
            });
        entry.balance = entry.balance.checked_add(sale.partner_payout_amount)?;
        entry.sale_ids.push(sale.id);
    }

    Ok(by_partner
        .into_values()
        .filter(|b| b.balance >= threshold)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sale::SaleStatus;
    use proptest::prelude::*;

    fn sale(partner: PartnerId, payout: i64, status: SaleStatus) -> Sale {
        let mut s = Sale::new(
            partner,
            Amount::from_minor(payout * 2),
            Amount::from_minor(payout),
            Amount::from_minor(payout),
        );
        s.status = status;
        s
    }

    #[test]
    fn pending_balance_sums_payable_sales_only() {
        let partner = PartnerId::new();
        let other = PartnerId::new();
        let mut paid = sale(partner, 9999, SaleStatus::Completed);
        paid.attach_payout(ffmarket_core::PayoutId::new()).unwrap();

        let sales = vec![
            sale(partner, 1000, SaleStatus::Completed),
            sale(partner, 2000, SaleStatus::Completed),
            sale(partner, 500, SaleStatus::Pending),
            sale(partner, 700, SaleStatus::Processing),
            paid,
            sale(other, 4000, SaleStatus::Completed),
        ];

        assert_eq!(
            pending_balance(&sales, partner).unwrap(),
            Amount::from_minor(3000)
        );
    }

    #[test]
    fn due_partners_applies_threshold() {
        let rich = PartnerId::new();
        let poor = PartnerId::new();
        let sales = vec![
            sale(rich, 1000, SaleStatus::Completed),
            sale(rich, 2000, SaleStatus::Completed),
            sale(rich, 3000, SaleStatus::Completed),
            sale(poor, 100, SaleStatus::Completed),
        ];

        let due = due_partners(&sales, Amount::from_minor(2500)).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].partner_id, rich);
        assert_eq!(due[0].balance, Amount::from_minor(6000));
        assert_eq!(due[0].sale_ids.len(), 3);
    }

    proptest! {
        /// The pending balance equals the arithmetic sum of payout amounts for
        /// any set of completed, unattached sales.
        #[test]
        fn balance_equals_arithmetic_sum(amounts in prop::collection::vec(0i64..1_000_000, 0..50)) {
            let partner = PartnerId::new();
            let sales: Vec<Sale> = amounts
                .iter()
                .map(|a| sale(partner, *a, SaleStatus::Completed))
                .collect();

            let expected: i64 = amounts.iter().sum();
            prop_assert_eq!(
                pending_balance(&sales, partner).unwrap(),
                Amount::from_minor(expected)
            );
        }
    }
}
