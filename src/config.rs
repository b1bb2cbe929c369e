use std::{fs, path::Path};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, fine::FinePolicy};

/// What happens to a returned book that has a reservation queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Handoff {
    /// Issue the book straight to the head of the queue
    #[default]
    Immediate,
    /// Mark the book `Reserved` and wait for the head member to issue it
    HoldForClaim,
}

/// Lending policy values
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LendingConfig {
    /// Days added to the issue date, and to the due date on renewal
    pub loan_period_days: u32,
    /// Fine charged per overdue day
    pub fine_rate_per_day: Decimal,
    /// Loan cap for members without their own; `None` means unbounded
    pub default_max_books: Option<usize>,
    /// Reservation handoff on return
    pub handoff: Handoff,
    /// Number of status transitions kept in history
    pub max_history: usize,
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            loan_period_days: 14,
            fine_rate_per_day: dec!(0.50),
            default_max_books: Some(5),
            handoff: Handoff::Immediate,
            max_history: 100,
        }
    }
}

impl LendingConfig {
    /// Parse and validate a JSON config
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed JSON or unknown keys and
    /// `ConfigError::Invalid` when a value is out of range
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise the
    /// errors of [`LendingConfig::from_json_str`]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for a zero loan period or a negative fine rate
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loan_period_days == 0 {
            return Err(ConfigError::Invalid(
                "loan_period_days must be at least 1".to_string(),
            ));
        }
        if self.fine_rate_per_day.is_sign_negative() {
            return Err(ConfigError::Invalid(
                "fine_rate_per_day must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Fine policy for the configured rate
    #[must_use]
    pub fn fine_policy(&self) -> FinePolicy {
        FinePolicy::new(self.fine_rate_per_day)
    }
}
