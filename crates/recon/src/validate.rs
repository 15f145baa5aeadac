//! Post-run conservation check. Reports, never raises on imbalance.

use std::collections::{BTreeSet, HashSet};

use procledger_core::Table;
use serde::Serialize;

use crate::columns::{
    DELIVERIES, ORDERS, ORDER_ID, ORDER_ID_REF, RECEIVED_QUANTITY, REQUESTED_QUANTITY,
};
use crate::error::ReconError;
use crate::model::Ledger;

const TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConservationReport {
    pub ledger_received: f64,
    pub raw_received: f64,
    /// Received quantity of deliveries whose order is not in the orders table.
    pub orphan_received: f64,
    pub ledger_requested: f64,
    pub raw_requested: f64,
}

impl ConservationReport {
    pub fn received_conserved(&self) -> bool {
        (self.ledger_received - (self.raw_received - self.orphan_received)).abs() <= TOLERANCE
    }

    pub fn requested_conserved(&self) -> bool {
        (self.ledger_requested - self.raw_requested).abs() <= TOLERANCE
    }

    pub fn is_conserved(&self) -> bool {
        self.received_conserved() && self.requested_conserved()
    }
}

/// Compare ledger totals against the raw inputs the ledger was built from.
///
/// Requested quantity is counted once per order row (synthetic rows repeat
/// it); received quantity is summed over every line.
pub fn check_conservation(
    ledger: &Ledger,
    orders: &Table,
    deliveries: &Table,
) -> Result<ConservationReport, ReconError> {
    let o = orders.require_columns(ORDERS, &[ORDER_ID, REQUESTED_QUANTITY])?;
    let d = deliveries.require_columns(DELIVERIES, &[ORDER_ID_REF, RECEIVED_QUANTITY])?;

    let order_keys: HashSet<String> = orders
        .column_values(o[0])
        .filter_map(|v| v.key_text())
        .collect();
    let raw_requested: f64 = orders
        .column_values(o[1])
        .filter_map(|v| v.as_f64())
        .sum();

    let mut raw_received = 0.0;
    let mut orphan_received = 0.0;
    for row in deliveries.rows() {
        let qty = row[d[1]].as_f64().unwrap_or(0.0);
        raw_received += qty;
        let known = row[d[0]].key_text().is_some_and(|k| order_keys.contains(&k));
        if !known {
            orphan_received += qty;
        }
    }

    let ledger_received: f64 = ledger.lines.iter().map(|l| l.received_quantity).sum();
    let mut counted = BTreeSet::new();
    let ledger_requested: f64 = ledger
        .lines
        .iter()
        .filter(|l| counted.insert(l.order_index))
        .filter_map(|l| l.order.requested_quantity)
        .sum();

    let report = ConservationReport {
        ledger_received,
        raw_received,
        orphan_received,
        ledger_requested,
        raw_requested,
    };
    if !report.is_conserved() {
        log::warn!("ledger totals do not match the raw inputs: {report:?}");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use procledger_core::Value;

    use super::*;
    use crate::config::ReconOptions;
    use crate::engine::reconcile;

    #[test]
    fn orphans_are_accounted_separately() {
        let orders = Table::from_rows(
            ["order_id", "amount_before_tax", "requested_quantity", "unit_price", "due_date", "status"],
            vec![vec![
                Value::Int(1),
                Value::Decimal(100.0),
                Value::Decimal(10.0),
                Value::Decimal(10.0),
                Value::Null,
                Value::Null,
            ]],
        )
        .unwrap();
        let deliveries = Table::from_rows(
            ["order_id_ref", "registration_date", "received_quantity", "received_amount"],
            vec![
                vec![Value::text("1.0"), Value::Null, Value::Decimal(4.0), Value::Decimal(40.0)],
                vec![Value::text("2"), Value::Null, Value::Decimal(3.0), Value::Decimal(30.0)],
            ],
        )
        .unwrap();
        let options = ReconOptions::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        let ledger = reconcile(&orders, &deliveries, &options).unwrap();
        let report = check_conservation(&ledger, &orders, &deliveries).unwrap();
        assert_eq!(report.ledger_received, 4.0);
        assert_eq!(report.orphan_received, 3.0);
        assert_eq!(report.ledger_requested, 10.0);
        assert!(report.is_conserved());
    }
}
