//! Previous-vs-current cycle comparison of amounts grouped by status.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use procledger_core::{Table, Value};
use serde::{Deserialize, Serialize};

use crate::error::ReconError;

const BLANK_STATUS: &str = "(blank)";

/// Which columns to group, sum and split cycles by.
///
/// The ledger repeats order-level values on every delivery line. Summing such
/// a column needs `once_per` set to the order column, so each order counts
/// once per cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonSpec {
    pub status_column: String,
    pub amount_column: String,
    pub cycle_column: String,
    pub once_per: Option<String>,
}

impl Default for ComparisonSpec {
    fn default() -> Self {
        Self {
            status_column: "status".into(),
            amount_column: "received_amount".into(),
            cycle_column: "cycle_ts".into(),
            once_per: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub status: String,
    pub previous: f64,
    pub current: f64,
    pub delta: f64,
    /// Percent change against `previous`; `None` when `previous` is zero.
    pub delta_pct: Option<f64>,
}

/// Distinct cycle labels present in `column`, ascending.
pub fn available_cycles(table: &Table, column: &str) -> Vec<String> {
    let Some(idx) = table.column_index(column) else {
        return Vec::new();
    };
    table
        .column_values(idx)
        .filter_map(Value::as_text)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sum amounts per status for the `previous` and `current` cycles.
/// Rows come back sorted by current amount, largest first.
///
/// With `once_per`, only the first row of each key in a cycle is summed.
/// Rows with a null key are always summed.
pub fn compare_cycles(
    table: &Table,
    spec: &ComparisonSpec,
    previous: &str,
    current: &str,
) -> Result<Vec<ComparisonRow>, ReconError> {
    let idx = table.require_columns(
        "comparison",
        &[
            spec.status_column.as_str(),
            spec.amount_column.as_str(),
            spec.cycle_column.as_str(),
        ],
    )?;
    let (status, amount, cycle) = (idx[0], idx[1], idx[2]);
    let once_per = match &spec.once_per {
        Some(column) => Some(table.require_columns("comparison", &[column.as_str()])?[0]),
        None => None,
    };

    let mut totals: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    let mut counted: HashSet<(String, String)> = HashSet::new();
    for row in table.rows() {
        let Some(label) = row[cycle].as_text() else {
            continue;
        };
        let is_previous = label == previous;
        let is_current = label == current;
        if !is_previous && !is_current {
            continue;
        }
        if let Some(key) = once_per.and_then(|i| row[i].key_text()) {
            if !counted.insert((label, key)) {
                continue;
            }
        }
        let key = row[status].as_text().unwrap_or_else(|| BLANK_STATUS.to_string());
        let value = row[amount].as_f64().unwrap_or(0.0);
        let entry = totals.entry(key).or_default();
        if is_previous {
            entry.0 += value;
        }
        if is_current {
            entry.1 += value;
        }
    }

    let mut rows: Vec<ComparisonRow> = totals
        .into_iter()
        .map(|(status, (previous, current))| {
            let delta = current - previous;
            ComparisonRow {
                status,
                previous,
                current,
                delta,
                delta_pct: (previous != 0.0).then(|| delta / previous * 100.0),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.current.total_cmp(&a.current));
    Ok(rows)
}

pub fn comparison_table(rows: &[ComparisonRow]) -> Result<Table, ReconError> {
    let mut table = Table::new(["status", "previous", "current", "delta", "delta_pct"]);
    for r in rows {
        table.push_row(vec![
            Value::text(r.status.clone()),
            Value::Decimal(r.previous),
            Value::Decimal(r.current),
            Value::Decimal(r.delta),
            r.delta_pct.into(),
        ])?;
    }
    Ok(table)
}
