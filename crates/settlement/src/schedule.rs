//! Disbursement schedule: weekly cadence anchored to Monday.

use chrono::{Datelike, Days, NaiveDate};

/// Next scheduled disbursement date strictly after `today`.
///
/// With `w` as the weekday number (0 = Sunday .. 6 = Saturday),
/// `days_until_monday = (8 - w) mod 7`, substituting 7 when the result is 0 so
/// a Monday input yields the following Monday, never the same day.
pub fn next_payout_date(today: NaiveDate) -> NaiveDate {
    let w = today.weekday().num_days_from_sunday();
    let days_until_monday = match (8 - w) % 7 {
        0 => 7,
        d => d,
    };
    // Adding at most 7 days cannot leave the representable date range here.
    today
        .checked_add_days(Days::new(u64::from(days_until_monday)))
        .unwrap_or(today)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monday_returns_next_monday_seven_days_out() {
        // 2025-06-02 is a Monday.
        assert_eq!(next_payout_date(date(2025, 6, 2)), date(2025, 6, 9));
    }

    #[test]
    fn sunday_returns_tomorrow() {
        // 2025-06-01 is a Sunday.
        assert_eq!(next_payout_date(date(2025, 6, 1)), date(2025, 6, 2));
    }

    #[test]
    fn saturday_returns_two_days_out() {
        // 2025-06-07 is a Saturday.
        assert_eq!(next_payout_date(date(2025, 6, 7)), date(2025, 6, 9));
    }

    #[test]
    fn result_is_always_a_monday_strictly_in_the_future() {
        let start = date(2025, 1, 1);
        for offset in 0..60 {
            let today = start.checked_add_days(Days::new(offset)).unwrap();
            let next = next_payout_date(today);
            assert_eq!(next.weekday(), chrono::Weekday::Mon);
            assert!(next > today);
        }
    }
}
