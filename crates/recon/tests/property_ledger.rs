// Property-based tests for the reconciliation ledger.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use procledger_core::{Table, Value};
use procledger_recon::penalty::{late_days, penalty_rate, sanction_amount};
use procledger_recon::{check_conservation, reconcile, LineSource, PenaltyPolicy, ReconOptions};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct GenOrder {
    requested: u32,
    unit_price: u32,
    due_offset: Option<i64>,
    cancelled: bool,
    deliveries: Vec<GenDelivery>,
}

#[derive(Debug, Clone)]
struct GenDelivery {
    quantity: u32,
    registered_offset: Option<i64>,
}

fn arb_delivery() -> impl Strategy<Value = GenDelivery> {
    (0u32..15, prop::option::weighted(0.85, -20i64..20)).prop_map(|(quantity, registered_offset)| {
        GenDelivery { quantity, registered_offset }
    })
}

fn arb_order() -> impl Strategy<Value = GenOrder> {
    (
        1u32..40,
        1u32..100,
        prop::option::weighted(0.9, -30i64..30),
        prop::bool::weighted(0.2),
        prop::collection::vec(arb_delivery(), 0..4),
    )
        .prop_map(|(requested, unit_price, due_offset, cancelled, deliveries)| GenOrder {
            requested,
            unit_price,
            due_offset,
            cancelled,
            deliveries,
        })
}

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
}

fn date_at(offset: Option<i64>) -> Value {
    offset.map(|d| Value::Date(base() + Duration::days(d))).unwrap_or(Value::Null)
}

/// Orders and deliveries tables, plus one orphan delivery.
fn build_tables(orders: &[GenOrder]) -> (Table, Table) {
    let mut order_rows = Vec::new();
    let mut delivery_rows = Vec::new();
    for (i, o) in orders.iter().enumerate() {
        let id = format!("O{i}");
        order_rows.push(vec![
            Value::text(id.clone()),
            Value::Decimal(f64::from(o.requested * o.unit_price)),
            Value::Int(i64::from(o.requested)),
            Value::Decimal(f64::from(o.unit_price)),
            date_at(o.due_offset),
            Value::text(if o.cancelled { "Cancelled" } else { "Open" }),
        ]);
        for (n, d) in o.deliveries.iter().enumerate() {
            delivery_rows.push(vec![
                Value::text(format!("{id}-D{n}")),
                Value::text(id.clone()),
                date_at(d.registered_offset),
                Value::Int(i64::from(d.quantity)),
                Value::Decimal(f64::from(d.quantity * o.unit_price)),
            ]);
        }
    }
    delivery_rows.push(vec![
        Value::text("X-1"),
        Value::text("missing-order"),
        Value::Null,
        Value::Int(3),
        Value::Decimal(30.0),
    ]);

    let orders = Table::from_rows(
        ["order_id", "amount_before_tax", "requested_quantity", "unit_price", "due_date", "status"],
        order_rows,
    )
    .unwrap();
    let deliveries = Table::from_rows(
        ["delivery_id", "order_id_ref", "registration_date", "received_quantity", "received_amount"],
        delivery_rows,
    )
    .unwrap();
    (orders, deliveries)
}

fn options() -> ReconOptions {
    ReconOptions::new(base())
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn quantities_are_conserved(orders in prop::collection::vec(arb_order(), 0..12)) {
        let (o, d) = build_tables(&orders);
        let ledger = reconcile(&o, &d, &options()).unwrap();
        let report = check_conservation(&ledger, &o, &d).unwrap();
        prop_assert!(report.is_conserved(), "{report:?}");
        prop_assert_eq!(report.orphan_received, 3.0);
    }

    #[test]
    fn at_most_one_pending_row_per_order(orders in prop::collection::vec(arb_order(), 1..12)) {
        let (o, d) = build_tables(&orders);
        let ledger = reconcile(&o, &d, &options()).unwrap();
        for (i, gen) in orders.iter().enumerate() {
            let key = format!("O{i}");
            let lines: Vec<_> = ledger.lines_for(&key).collect();
            let pending = lines.iter().filter(|l| l.source.is_pending()).count();
            let synthetic = lines.iter().filter(|l| l.source == LineSource::Synthetic).count();
            prop_assert!(pending <= 1);

            let received: u32 = gen.deliveries.iter().map(|d| d.quantity).sum();
            let has_zero = gen.deliveries.iter().any(|d| d.quantity == 0);
            let expect_synthetic = !gen.deliveries.is_empty() && received < gen.requested && !has_zero;
            prop_assert_eq!(synthetic, usize::from(expect_synthetic));
        }
    }

    #[test]
    fn shortfall_is_attributed_once(orders in prop::collection::vec(arb_order(), 1..12)) {
        let (o, d) = build_tables(&orders);
        let ledger = reconcile(&o, &d, &options()).unwrap();
        for (i, gen) in orders.iter().enumerate() {
            let key = format!("O{i}");
            let sanctionable: f64 = ledger.lines_for(&key).map(|l| l.sanctionable_quantity).sum();
            let received: u32 = gen.deliveries.iter().map(|d| d.quantity).sum();
            let expected = received.max(gen.requested);
            prop_assert_eq!(sanctionable, f64::from(expected));
        }
    }

    #[test]
    fn cancelled_pending_rows_never_pay(orders in prop::collection::vec(arb_order(), 1..12)) {
        let (o, d) = build_tables(&orders);
        let ledger = reconcile(&o, &d, &options()).unwrap();
        for line in &ledger.lines {
            if line.order.status.as_deref() == Some("Cancelled") && line.delivery_id.is_null() {
                prop_assert_eq!(line.sanction_amount, 0.0);
            }
            prop_assert!(line.sanction_amount >= 0.0);
        }
    }

    #[test]
    fn penalty_is_monotonic_and_capped(
        quantity in 0.0..1000.0f64,
        price in 0.0..1000.0f64,
        late in 0i64..30,
    ) {
        let policy = PenaltyPolicy::default();
        let at = |days: i64| {
            let rate = penalty_rate(late_days(Some(-days), &policy), &policy);
            sanction_amount(quantity, price, rate)
        };
        prop_assert!(at(late) <= at(late + 1));
        if late >= policy.max_late_days {
            prop_assert_eq!(at(late), at(policy.max_late_days));
        }
    }
}
