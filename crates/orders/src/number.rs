//! Human-readable order numbers: `FF-YYYYMMDD-####`.

use chrono::NaiveDate;
use rand::Rng;

/// Literal business prefix on every order number.
pub const ORDER_NUMBER_PREFIX: &str = "FF";

/// Generate an order number for the given date.
///
/// The 4-digit suffix is pseudo-random and deliberately not unique: the order
/// number is a display label for buyers and support staff, while identity is
/// carried by the order's uuid. Collisions are accepted.
pub fn generate_order_number(date: NaiveDate, rng: &mut impl Rng) -> String {
    let suffix: u16 = rng.gen_range(0..10000);
    format!(
        "{}-{}-{:04}",
        ORDER_NUMBER_PREFIX,
        date.format("%Y%m%d"),
        suffix
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn format_is_prefix_date_and_four_digit_suffix() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let number = generate_order_number(date, &mut rng);

        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "FF");
        assert_eq!(parts[1], "20250601");
        assert_eq!(parts[2].len(), 4);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn suffix_stays_in_range_and_zero_pads() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..200 {
            let number = generate_order_number(date, &mut rng);
            let suffix = number.rsplit('-').next().unwrap();
            assert_eq!(suffix.len(), 4);
            assert!(suffix.parse::<u16>().unwrap() < 10000);
        }
    }
}
