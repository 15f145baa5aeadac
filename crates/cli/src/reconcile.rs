//! `procledger reconcile`: one orders export plus one deliveries export in,
//! penalty ledger out.

use std::io::Write;
use std::path::PathBuf;

use chrono::NaiveDate;
use procledger_config::Settings;
use procledger_core::Table;
use procledger_recon::{check_conservation, reconcile, ConservationReport, Ledger, ReconOptions};
use serde::Serialize;

use crate::exit_codes::EXIT_RECON_NOT_CONSERVED;
use crate::util::{print_json, read_table, today_or_local, write_table};
use crate::CliError;

#[derive(Serialize)]
struct ReconcileOutput<'a> {
    ledger: &'a Ledger,
    conservation: &'a ConservationReport,
}

pub fn recon_options(settings: &Settings, today: NaiveDate) -> ReconOptions {
    ReconOptions::new(today)
        .with_policy(settings.penalty.clone())
        .with_date_format(settings.dates.format.clone())
}

/// Reconcile and check totals. With `strict`, a mismatch is an error;
/// otherwise it is logged.
pub fn build_ledger(
    orders: &Table,
    deliveries: &Table,
    options: &ReconOptions,
    strict: bool,
) -> Result<(Ledger, ConservationReport), CliError> {
    let ledger = reconcile(orders, deliveries, options)?;
    let conservation = check_conservation(&ledger, orders, deliveries)?;
    if !conservation.is_conserved() {
        let message = format!(
            "ledger totals do not match inputs: received {} vs {} (orphans {}), requested {} vs {}",
            conservation.ledger_received,
            conservation.raw_received,
            conservation.orphan_received,
            conservation.ledger_requested,
            conservation.raw_requested
        );
        if strict {
            return Err(CliError::new(EXIT_RECON_NOT_CONSERVED, message)
                .with_hint("look for duplicate order ids in the orders export"));
        }
        tracing::warn!("{message}");
    }
    Ok((ledger, conservation))
}

pub fn cmd_reconcile(
    settings: &Settings,
    orders: PathBuf,
    deliveries: PathBuf,
    today: Option<NaiveDate>,
    out: Option<PathBuf>,
    json: bool,
    strict: bool,
) -> Result<(), CliError> {
    let orders = read_table(&orders)?;
    let deliveries = read_table(&deliveries)?;
    let options = recon_options(settings, today_or_local(today));
    let (ledger, conservation) = build_ledger(&orders, &deliveries, &options, strict)?;

    if let Some(path) = &out {
        write_table(&ledger.to_table()?, path)?;
    }

    if json {
        return print_json(&ReconcileOutput {
            ledger: &ledger,
            conservation: &conservation,
        });
    }

    let s = &ledger.summary;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(
        handle,
        "orders: {}  lines: {}  matched: {}  orphans: {}  pending: {}  late: {}",
        s.orders, s.lines, s.matched_deliveries, s.orphan_deliveries, s.synthetic_lines, s.late_lines
    )
    .and_then(|_| writeln!(handle, "total sanction: {:.2}", s.total_sanction))
    .map_err(|e| CliError::io(e.to_string()))
}
