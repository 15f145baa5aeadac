use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Penalty policy
// ---------------------------------------------------------------------------

/// Contractual lateness terms.
///
/// A row is late once its `days_diff` goes negative. Lateness accrues
/// `rate_per_day` per day up to `max_late_days`; undelivered balances stop
/// accruing `grace_days` after the due date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyPolicy {
    pub rate_per_day: f64,
    pub max_late_days: i64,
    pub grace_days: i64,
    /// Minimum outstanding amount that still counts as an open balance.
    pub balance_epsilon: f64,
    /// Status label of cancelled orders (trimmed, case-insensitive).
    pub cancelled_status: String,
}

impl Default for PenaltyPolicy {
    fn default() -> Self {
        Self {
            rate_per_day: 0.02,
            max_late_days: 5,
            grace_days: 5,
            balance_epsilon: 1e-9,
            cancelled_status: "Cancelled".to_string(),
        }
    }
}

/// Upper bound for the day counts of a policy.
pub const MAX_POLICY_DAYS: i64 = 36_500;

impl PenaltyPolicy {
    pub fn validate(&self) -> Result<(), ReconError> {
        if !self.rate_per_day.is_finite() || self.rate_per_day <= 0.0 {
            return Err(ReconError::InvalidPolicy(format!(
                "rate_per_day must be positive, got {}",
                self.rate_per_day
            )));
        }
        if !(0..=MAX_POLICY_DAYS).contains(&self.max_late_days) {
            return Err(ReconError::InvalidPolicy(format!(
                "max_late_days must be between 0 and {MAX_POLICY_DAYS}, got {}",
                self.max_late_days
            )));
        }
        if !(0..=MAX_POLICY_DAYS).contains(&self.grace_days) {
            return Err(ReconError::InvalidPolicy(format!(
                "grace_days must be between 0 and {MAX_POLICY_DAYS}, got {}",
                self.grace_days
            )));
        }
        if !self.balance_epsilon.is_finite() || self.balance_epsilon < 0.0 {
            return Err(ReconError::InvalidPolicy(format!(
                "balance_epsilon must be a non-negative number, got {}",
                self.balance_epsilon
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Run options
// ---------------------------------------------------------------------------

/// Per-call inputs besides the two tables. `today` is explicit so a run is
/// reproducible; the CLI fills it from the local clock.
#[derive(Debug, Clone)]
pub struct ReconOptions {
    pub today: NaiveDate,
    /// The one accepted pattern for textual dates.
    pub date_format: String,
    pub policy: PenaltyPolicy,
}

impl ReconOptions {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            policy: PenaltyPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PenaltyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }
}

pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_valid() {
        assert!(PenaltyPolicy::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_rate() {
        let policy = PenaltyPolicy { rate_per_day: 0.0, ..Default::default() };
        let err = policy.validate().unwrap_err();
        assert!(err.to_string().contains("rate_per_day"));
    }

    #[test]
    fn rejects_out_of_range_days() {
        let policy = PenaltyPolicy { grace_days: -1, ..Default::default() };
        assert!(policy.validate().unwrap_err().to_string().contains("grace_days"));
        let policy = PenaltyPolicy { grace_days: i64::MAX, ..Default::default() };
        assert!(policy.validate().unwrap_err().to_string().contains("grace_days"));
        let policy = PenaltyPolicy { max_late_days: MAX_POLICY_DAYS + 1, ..Default::default() };
        assert!(policy.validate().unwrap_err().to_string().contains("max_late_days"));
    }

    #[test]
    fn partial_policy_fills_defaults() {
        let policy: PenaltyPolicy = serde_json::from_str(r#"{"grace_days": 3}"#).unwrap();
        assert_eq!(policy.grace_days, 3);
        assert_eq!(policy.max_late_days, 5);
        assert_eq!(policy.cancelled_status, "Cancelled");
    }
}
