use std::path::PathBuf;

use chrono::NaiveDate;
use procledger_core::{Table, Value};
use procledger_recon::model::PENDING_DELIVERY_KEY;
use procledger_recon::{
    check_conservation, reconcile, Ledger, LineSource, ReconError, ReconOptions, LEDGER_COLUMNS,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_table(name: &str) -> Table {
    let path = fixtures_dir().join(name);
    let mut reader = csv::Reader::from_path(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(Value::text).collect())
        .collect();
    Table::from_rows(headers, rows).unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 20).unwrap()
}

fn run_fixtures() -> (Table, Table, Ledger) {
    let orders = load_table("orders.csv");
    let deliveries = load_table("deliveries.csv");
    let ledger = reconcile(&orders, &deliveries, &ReconOptions::new(today())).unwrap();
    (orders, deliveries, ledger)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// -------------------------------------------------------------------------
// Ledger shape
// -------------------------------------------------------------------------

#[test]
fn fixture_ledger_summary() {
    let (_, _, ledger) = run_fixtures();
    assert_eq!(ledger.summary.orders, 5);
    assert_eq!(ledger.summary.lines, 7);
    assert_eq!(ledger.summary.matched_deliveries, 3);
    assert_eq!(ledger.summary.orphan_deliveries, 1);
    assert_eq!(ledger.summary.synthetic_lines, 1);
    assert!(approx(ledger.summary.total_sanction, 2.4 + 4.0 + 1.8));
}

#[test]
fn partial_delivery_gets_one_pending_row() {
    let (_, _, ledger) = run_fixtures();
    let lines: Vec<_> = ledger.lines_for("O1").collect();
    assert_eq!(lines.len(), 2);

    assert_eq!(lines[0].delivery_key, "D1");
    assert_eq!(lines[0].days_diff, Some(-2));
    assert_eq!(lines[0].late_days, 2);
    assert!(approx(lines[0].penalty_rate, 0.04));
    assert_eq!(lines[0].sanctionable_quantity, 6.0);
    assert!(approx(lines[0].sanction_amount, 2.4));

    assert_eq!(lines[1].source, LineSource::Synthetic);
    assert_eq!(lines[1].delivery_key, PENDING_DELIVERY_KEY);
    assert_eq!(lines[1].sanctionable_quantity, 4.0);
    assert_eq!(lines[1].pending_quantity, 4.0);
    assert_eq!(lines[1].pending_amount, 40.0);
    // ten days past due, grace exhausted
    assert_eq!(lines[1].days_diff, Some(-5));
    assert!(approx(lines[1].sanction_amount, 4.0));
}

#[test]
fn order_within_grace_is_not_penalized() {
    let (_, _, ledger) = run_fixtures();
    let lines: Vec<_> = ledger.lines_for("O2").collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].source, LineSource::Unmatched);
    assert_eq!(lines[0].days_diff, Some(5));
    assert_eq!(lines[0].sanctionable_quantity, 5.0);
    assert_eq!(lines[0].sanction_amount, 0.0);
}

#[test]
fn cancelled_order_is_zeroed() {
    let (_, _, ledger) = run_fixtures();
    let line = ledger.lines_for("O3").next().unwrap();
    assert_eq!(line.days_diff, Some(-5));
    assert_eq!(line.sanction_amount, 0.0);
    assert_eq!(line.penalty_rate, 0.0);
}

#[test]
fn deliveries_are_ordered_by_registration() {
    let (_, _, ledger) = run_fixtures();
    let lines: Vec<_> = ledger.lines_for("O4").collect();
    let keys: Vec<&str> = lines.iter().map(|l| l.delivery_key.as_str()).collect();
    assert_eq!(keys, vec!["D2", "D3"]);
    assert_eq!(lines[0].days_diff, Some(2));
    assert_eq!(lines[0].sanction_amount, 0.0);
    assert_eq!(lines[1].days_diff, Some(-3));
    assert!(approx(lines[1].sanction_amount, 1.8));
}

#[test]
fn blank_due_date_has_no_lateness() {
    let (_, _, ledger) = run_fixtures();
    let line = ledger.lines_for("O5").next().unwrap();
    assert_eq!(line.days_diff, None);
    assert_eq!(line.late_days, 0);
    assert_eq!(line.sanction_amount, 0.0);
}

// -------------------------------------------------------------------------
// Contracts
// -------------------------------------------------------------------------

#[test]
fn fixture_ledger_conserves_quantities() {
    let (orders, deliveries, ledger) = run_fixtures();
    let report = check_conservation(&ledger, &orders, &deliveries).unwrap();
    assert_eq!(report.ledger_received, 14.0);
    assert_eq!(report.raw_received, 15.0);
    assert_eq!(report.orphan_received, 1.0);
    assert_eq!(report.ledger_requested, 29.0);
    assert!(report.is_conserved());
}

#[test]
fn rerun_yields_identical_table() {
    let (orders, deliveries, first) = run_fixtures();
    let second = reconcile(&orders, &deliveries, &ReconOptions::new(today())).unwrap();
    assert_eq!(first.to_table().unwrap(), second.to_table().unwrap());
}

#[test]
fn table_columns_are_stable() {
    let (_, _, ledger) = run_fixtures();
    let table = ledger.to_table().unwrap();
    let names: Vec<&str> = table.columns().iter().map(String::as_str).collect();
    assert_eq!(names, LEDGER_COLUMNS);
    assert_eq!(table.len(), 7);
    assert_eq!(table.cell(0, "cycle_ts"), Some(&Value::text("2025-01-20-08")));
    assert_eq!(
        table.cell(0, "due_date"),
        Some(&Value::Date(NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()))
    );
}

#[test]
fn missing_delivery_column_is_fatal() {
    let orders = load_table("orders.csv");
    let deliveries = load_table("deliveries_missing_amount.csv");
    let err = reconcile(&orders, &deliveries, &ReconOptions::new(today())).unwrap_err();
    assert!(matches!(err, ReconError::Schema(_)));
    assert_eq!(
        err.to_string(),
        "deliveries: missing required column 'received_amount'"
    );
}

#[test]
fn ledger_serializes_to_json() {
    let (_, _, ledger) = run_fixtures();
    let json = serde_json::to_value(&ledger).unwrap();
    assert_eq!(json["summary"]["lines"], 7);
    assert_eq!(json["lines"][1]["source"], "synthetic");
    assert_eq!(json["lines"][0]["order"]["due_date"], "2025-01-10");
}
