//! Overdue fine calculation.
//!
//! Fines accrue per whole calendar day a loan stays out past its due date.
//! Returning on the due date, or before it, costs nothing.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Whole days `today` is past `due`; zero when not yet overdue
#[must_use]
pub fn days_overdue(due: NaiveDate, today: NaiveDate) -> u32 {
    let days = today.signed_duration_since(due).num_days();
    u32::try_from(days.max(0)).unwrap_or(u32::MAX)
}

/// `max(0, days between due and today) * rate_per_day`
#[must_use]
pub fn fine(due: NaiveDate, today: NaiveDate, rate_per_day: Decimal) -> Decimal {
    Decimal::from(days_overdue(due, today)).saturating_mul(rate_per_day)
}

/// Fine rate applied by the lending engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct FinePolicy {
    /// Charge per overdue day
    pub rate_per_day: Decimal,
}

impl FinePolicy {
    /// Policy charging `rate_per_day`
    #[must_use]
    pub fn new(rate_per_day: Decimal) -> Self {
        Self { rate_per_day }
    }

    /// Fine owed for a loan due on `due` and returned on `today`
    #[must_use]
    pub fn assess(&self, due: NaiveDate, today: NaiveDate) -> Decimal {
        fine(due, today, self.rate_per_day)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use super::{FinePolicy, days_overdue, fine};

    /// Shorthand for test dates
    #[allow(clippy::unwrap_used)]
    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_three_days_late_at_half_rate() {
        assert_eq!(
            fine(date(2024, 1, 1), date(2024, 1, 4), dec!(0.50)),
            dec!(1.50)
        );
    }

    #[test]
    fn test_on_time_is_free() {
        assert_eq!(
            fine(date(2024, 1, 1), date(2024, 1, 1), dec!(0.50)),
            dec!(0.00)
        );
    }

    #[test]
    fn test_early_return_never_goes_negative() {
        assert_eq!(days_overdue(date(2024, 1, 10), date(2024, 1, 1)), 0);
        assert_eq!(
            fine(date(2024, 1, 10), date(2024, 1, 1), dec!(1.00)),
            dec!(0)
        );
    }

    #[test]
    fn test_policy_crosses_month_boundary() {
        let policy = FinePolicy::new(dec!(1.00));
        let owed = policy.assess(date(2024, 1, 29), date(2024, 2, 4));
        assert_eq!(owed, dec!(6.00));
    }
}
