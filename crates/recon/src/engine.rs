use procledger_core::Table;

use crate::columns::{read_deliveries, read_orders};
use crate::config::ReconOptions;
use crate::error::ReconError;
use crate::join::{left_join, OrderGroup};
use crate::model::{Ledger, LedgerLine, LedgerMeta, LedgerSummary, LineSource, PENDING_DELIVERY_KEY};
use crate::penalty;

/// Reconcile orders against deliveries into a penalty ledger.
///
/// Fails only on a missing required column or an invalid policy; row-level
/// problems (bad dates, missing numbers) degrade to nulls.
pub fn reconcile(orders: &Table, deliveries: &Table, options: &ReconOptions) -> Result<Ledger, ReconError> {
    options.policy.validate()?;
    let order_lines = read_orders(orders, &options.date_format)?;
    let delivery_lines = read_deliveries(deliveries, &options.date_format)?;

    let (mut groups, stats) = left_join(&order_lines, &delivery_lines);

    let mut summary = LedgerSummary {
        orders: order_lines.len(),
        matched_deliveries: stats.matched_deliveries,
        orphan_deliveries: stats.orphan_deliveries,
        ..Default::default()
    };

    let mut lines = Vec::new();
    for group in &mut groups {
        if group.synthesize_pending(options.policy.balance_epsilon) {
            summary.synthetic_lines += 1;
        }
        group.sort_by_registration();
        lines.extend(price_group(group, options));
    }

    summary.lines = lines.len();
    summary.late_lines = lines.iter().filter(|l| l.late_days > 0).count();
    summary.total_sanction = lines.iter().map(|l| l.sanction_amount).sum();

    log::debug!(
        "reconciled {} order(s) into {} line(s): {} matched, {} orphan, {} synthetic",
        summary.orders,
        summary.lines,
        summary.matched_deliveries,
        summary.orphan_deliveries,
        summary.synthetic_lines
    );

    Ok(Ledger {
        meta: LedgerMeta {
            today: options.today,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        lines,
    })
}

/// Derived fields for one sorted order group.
fn price_group(group: &OrderGroup<'_>, options: &ReconOptions) -> Vec<LedgerLine> {
    let policy = &options.policy;
    let order = group.order;

    let received: Vec<f64> = group.rows.iter().map(|r| r.received_quantity).collect();
    let requested = order.requested_quantity.unwrap_or(0.0);
    let (sanctionable, attributed) = penalty::allocate_sanctionable(&received, requested);
    if !attributed {
        log::warn!(
            "order '{}': shortfall of {} has no undelivered row to absorb it",
            order.order_id,
            requested - group.total_received_quantity()
        );
    }

    let pending_quantity = (requested - group.total_received_quantity()).max(0.0);
    let pending_amount =
        (order.amount_before_tax.unwrap_or(0.0) - group.total_received_amount()).max(0.0);
    let cancelled = penalty::is_cancelled(order.status.as_deref(), policy);
    let unit_price = order.unit_price.unwrap_or(0.0);

    let mut real_deliveries = 0usize;
    group
        .rows
        .iter()
        .zip(sanctionable)
        .map(|(row, sanctionable_quantity)| {
            let delivery_key = match (&row.source, row.delivery_id.key_text()) {
                (LineSource::Delivery, Some(id)) => id,
                (LineSource::Delivery, None) => {
                    real_deliveries += 1;
                    format!("delivery-{real_deliveries}")
                }
                _ => PENDING_DELIVERY_KEY.to_string(),
            };

            let days_diff =
                penalty::days_diff(order.due_date, row.registration_date, options.today, policy);
            let late_days = penalty::late_days(days_diff, policy);
            let (penalty_rate, sanction_amount) = if cancelled && row.delivery_id.is_null() {
                (0.0, 0.0)
            } else {
                let rate = penalty::penalty_rate(late_days, policy);
                (rate, penalty::sanction_amount(sanctionable_quantity, unit_price, rate))
            };

            let (pending_quantity, pending_amount) = if row.source.is_pending() {
                (pending_quantity, pending_amount)
            } else {
                (0.0, 0.0)
            };

            LedgerLine {
                order: order.clone(),
                order_index: group.order_index,
                source: row.source,
                delivery_id: row.delivery_id.clone(),
                delivery_key,
                registration_date: row.registration_date,
                received_quantity: row.received_quantity,
                received_amount: row.received_amount,
                pending_quantity,
                pending_amount,
                days_diff,
                late_days,
                penalty_rate,
                sanctionable_quantity,
                sanction_amount,
            }
        })
        .collect()
}

/// Convenience for callers holding the ledger only as a table.
pub fn reconcile_to_table(
    orders: &Table,
    deliveries: &Table,
    options: &ReconOptions,
) -> Result<Table, ReconError> {
    reconcile(orders, deliveries, options)?.to_table()
}
