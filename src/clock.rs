use std::{
    fmt,
    sync::{PoisonError, RwLock},
};

use chrono::{Days, Local, NaiveDate};

/// Source of "today" for due dates and overdue checks
pub trait Clock: Send + Sync + fmt::Debug {
    /// The current calendar date
    fn today(&self) -> NaiveDate;
}

/// Reads the local wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    /// Date reported by `today`
    date: RwLock<NaiveDate>,
}

impl ManualClock {
    /// Start the clock at `date`
    #[must_use]
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: RwLock::new(date),
        }
    }

    /// Jump to `date`
    pub fn set(&self, date: NaiveDate) {
        *self.date.write().unwrap_or_else(PoisonError::into_inner) = date;
    }

    /// Move forward by `days`. Saturates at the last representable date.
    pub fn advance(&self, days: u64) {
        let mut date = self.date.write().unwrap_or_else(PoisonError::into_inner);
        *date = date
            .checked_add_days(Days::new(days))
            .unwrap_or(NaiveDate::MAX);
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.date.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Clock, ManualClock};

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_manual_clock_advances() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.today(), start);
        clock.advance(14);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        clock.set(start);
        assert_eq!(clock.today(), start);
    }
}
