//! Lateness and penalty arithmetic. Pure functions over one row or one
//! order group; the engine wires them together.

use chrono::{Duration, NaiveDate};

use crate::config::PenaltyPolicy;

/// Signed lateness in days; positive means early or on time.
///
/// Without a registration date the row is still owed: inside the grace
/// window the count runs against `today`, past it the value is clamped to
/// `-grace_days` and stops growing. A window ending past the last
/// representable date never closes.
pub fn days_diff(
    due: Option<NaiveDate>,
    registered: Option<NaiveDate>,
    today: NaiveDate,
    policy: &PenaltyPolicy,
) -> Option<i64> {
    let due = due?;
    match registered {
        Some(registered) => Some((due - registered).num_days()),
        None => {
            let window_end = Duration::try_days(policy.grace_days).and_then(|g| due.checked_add_signed(g));
            if window_end.map_or(true, |end| today <= end) {
                Some((due - today).num_days())
            } else {
                Some(-policy.grace_days)
            }
        }
    }
}

/// Accrued late days, capped at `max_late_days`. Zero when on time or unknown.
pub fn late_days(days_diff: Option<i64>, policy: &PenaltyPolicy) -> i64 {
    match days_diff {
        Some(d) if d < 0 => (-d).min(policy.max_late_days),
        _ => 0,
    }
}

pub fn penalty_rate(late_days: i64, policy: &PenaltyPolicy) -> f64 {
    late_days as f64 * policy.rate_per_day
}

pub fn sanction_amount(sanctionable_quantity: f64, unit_price: f64, rate: f64) -> f64 {
    sanctionable_quantity * unit_price * rate
}

pub fn is_cancelled(status: Option<&str>, policy: &PenaltyPolicy) -> bool {
    status.is_some_and(|s| s.trim().eq_ignore_ascii_case(policy.cancelled_status.trim()))
}

/// Sanctionable quantity per row of one order group, in the group's order.
///
/// Every row starts with its own received quantity. When the group received
/// less than `requested`, the first row with zero received quantity takes
/// the whole shortfall. Returns `false` as second element when a shortfall
/// exists but no row could absorb it.
pub fn allocate_sanctionable(received: &[f64], requested: f64) -> (Vec<f64>, bool) {
    let mut sanctionable = received.to_vec();
    let total: f64 = received.iter().sum();
    let shortfall = requested - total;
    if shortfall <= 0.0 {
        return (sanctionable, true);
    }
    match received.iter().position(|q| *q == 0.0) {
        Some(i) => {
            sanctionable[i] += shortfall;
            (sanctionable, true)
        }
        None => (sanctionable, false),
    }
}
