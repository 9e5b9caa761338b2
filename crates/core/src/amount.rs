//! Monetary amounts in minor currency units.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// A monetary amount in minor currency units (e.g. cents).
///
/// Single-currency by design; the platform settles in one currency and tax is
/// fixed at zero, so no currency code or scale travels with the value.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Overflow-checked addition. Money sums must never wrap silently.
    pub fn checked_add(self, other: Amount) -> DomainResult<Amount> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    /// Overflow-checked line total: unit price times quantity.
    pub fn checked_mul_qty(self, quantity: u32) -> DomainResult<Amount> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Amount)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    /// Sum a sequence of amounts, failing on overflow.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Amount>) -> DomainResult<Amount> {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, a| acc.checked_add(a))
    }
}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_total_multiplies_unit_price_by_quantity() {
        let total = Amount::from_minor(5000).checked_mul_qty(2).unwrap();
        assert_eq!(total, Amount::from_minor(10000));
    }

    #[test]
    fn sum_folds_over_amounts() {
        let sum = Amount::checked_sum([
            Amount::from_minor(1000),
            Amount::from_minor(2000),
            Amount::from_minor(3000),
        ])
        .unwrap();
        assert_eq!(sum, Amount::from_minor(6000));
    }

    #[test]
    fn overflow_is_an_error_not_a_wrap() {
        let err = Amount::from_minor(i64::MAX)
            .checked_add(Amount::from_minor(1))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
