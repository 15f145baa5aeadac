//! Input column names and typed extraction of order/delivery lines.

use chrono::NaiveDate;
use procledger_core::normalize::parse_with_format;
use procledger_core::{Table, Value};

use crate::error::ReconError;
use crate::model::{DeliveryLine, OrderLine};

pub const ORDERS: &str = "orders";
pub const DELIVERIES: &str = "deliveries";

pub const ORDER_ID: &str = "order_id";
pub const AMOUNT_BEFORE_TAX: &str = "amount_before_tax";
pub const REQUESTED_QUANTITY: &str = "requested_quantity";
pub const UNIT_PRICE: &str = "unit_price";
pub const DUE_DATE: &str = "due_date";
pub const STATUS: &str = "status";
pub const CONTRACT_ID: &str = "contract_id";
pub const ARTICLE_CODE: &str = "article_code";
pub const ISSUE_DATE: &str = "issue_date";
pub const CYCLE_TS: &str = "cycle_ts";

pub const ORDER_ID_REF: &str = "order_id_ref";
pub const REGISTRATION_DATE: &str = "registration_date";
pub const RECEIVED_QUANTITY: &str = "received_quantity";
pub const RECEIVED_AMOUNT: &str = "received_amount";
pub const DELIVERY_ID: &str = "delivery_id";

pub const REQUIRED_ORDER_COLUMNS: &[&str] = &[
    ORDER_ID,
    AMOUNT_BEFORE_TAX,
    REQUESTED_QUANTITY,
    UNIT_PRICE,
    DUE_DATE,
    STATUS,
];

pub const REQUIRED_DELIVERY_COLUMNS: &[&str] =
    &[ORDER_ID_REF, REGISTRATION_DATE, RECEIVED_QUANTITY, RECEIVED_AMOUNT];

/// Typed order lines in table order. Fails on the first missing required column.
pub fn read_orders(table: &Table, date_format: &str) -> Result<Vec<OrderLine>, ReconError> {
    let idx = table.require_columns(ORDERS, REQUIRED_ORDER_COLUMNS)?;
    let (order_id, amount, requested, price, due, status) =
        (idx[0], idx[1], idx[2], idx[3], idx[4], idx[5]);
    let contract = table.column_index(CONTRACT_ID);
    let article = table.column_index(ARTICLE_CODE);
    let issue = table.column_index(ISSUE_DATE);
    let cycle = table.column_index(CYCLE_TS);

    let lines = table
        .rows()
        .iter()
        .map(|row| {
            let id = row[order_id].clone().canonicalize();
            OrderLine {
                contract_id: optional(row, contract),
                order_key: id.key_text(),
                order_id: id,
                article_code: optional(row, article),
                issue_date: issue.and_then(|i| parse_date(&row[i], date_format)),
                due_date: parse_date(&row[due], date_format),
                requested_quantity: row[requested].as_f64(),
                unit_price: row[price].as_f64(),
                amount_before_tax: row[amount].as_f64(),
                status: row[status].as_text(),
                cycle_ts: optional(row, cycle),
            }
        })
        .collect();
    Ok(lines)
}

/// Typed delivery lines in table order.
pub fn read_deliveries(table: &Table, date_format: &str) -> Result<Vec<DeliveryLine>, ReconError> {
    let idx = table.require_columns(DELIVERIES, REQUIRED_DELIVERY_COLUMNS)?;
    let (order_ref, registered, quantity, amount) = (idx[0], idx[1], idx[2], idx[3]);
    let delivery_id = table.column_index(DELIVERY_ID);

    let lines = table
        .rows()
        .iter()
        .map(|row| DeliveryLine {
            delivery_id: optional(row, delivery_id),
            order_key: row[order_ref].key_text(),
            registration_date: parse_date(&row[registered], date_format),
            received_quantity: row[quantity].as_f64().unwrap_or(0.0),
            received_amount: row[amount].as_f64().unwrap_or(0.0),
        })
        .collect();
    Ok(lines)
}

fn optional(row: &[Value], idx: Option<usize>) -> Value {
    idx.map(|i| row[i].clone().canonicalize()).unwrap_or(Value::Null)
}

/// Typed dates pass through; text must match `format` exactly, anything
/// else is `None`.
pub fn parse_date(value: &Value, format: &str) -> Option<NaiveDate> {
    match value {
        Value::Date(_) | Value::DateTime(_) => value.as_date(),
        Value::Text(s) => parse_with_format(s, format).map(|dt| dt.date()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_column_names_input_table() {
        let deliveries = Table::new(["order_id_ref", "received_quantity", "received_amount"]);
        let err = read_deliveries(&deliveries, "%d/%m/%Y").unwrap_err();
        assert_eq!(
            err.to_string(),
            "deliveries: missing required column 'registration_date'"
        );
    }

    #[test]
    fn dates_use_declared_format_only() {
        let d = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        assert_eq!(parse_date(&Value::text("10/01/2025"), "%d/%m/%Y"), Some(d));
        assert_eq!(parse_date(&Value::text("2025-01-10"), "%d/%m/%Y"), None);
        assert_eq!(parse_date(&Value::Date(d), "%d/%m/%Y"), Some(d));
        assert_eq!(parse_date(&Value::Int(45667), "%d/%m/%Y"), None);
    }

    #[test]
    fn orders_read_numbers_from_text() {
        let orders = Table::from_rows(
            REQUIRED_ORDER_COLUMNS.iter().copied(),
            vec![vec![
                Value::text("1001.0"),
                Value::text("100.00"),
                Value::text("10"),
                Value::text("nan"),
                Value::text("10/01/2025"),
                Value::text(" Open "),
            ]],
        )
        .unwrap();
        let lines = read_orders(&orders, "%d/%m/%Y").unwrap();
        assert_eq!(lines[0].order_key.as_deref(), Some("1001"));
        assert_eq!(lines[0].amount_before_tax, Some(100.0));
        assert_eq!(lines[0].unit_price, None);
        assert_eq!(lines[0].status.as_deref(), Some("Open"));
        assert!(lines[0].cycle_ts.is_null());
    }
}
