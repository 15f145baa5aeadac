//! `procledger run`: the scheduled pipeline.
//!
//! Bundle exports into cycles, classify and normalize each file, reconcile
//! every complete cycle and load its ledger. Loads are idempotent, so a
//! rerun over the same directory adds nothing.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use procledger_config::Settings;
use procledger_core::{Table, Value};
use procledger_io::{complete_groups, CycleGroup, LoadReport, SchemaRegistry, DEFAULT_HEADER_SCAN};
use procledger_recon::columns::{CYCLE_TS, DELIVERIES, ORDERS};
use procledger_recon::ReconOptions;
use serde::Serialize;

use crate::exit_codes::EXIT_INPUT_NO_CYCLES;
use crate::reconcile::{build_ledger, recon_options};
use crate::util::{print_json, today_or_local, warehouse};
use crate::CliError;

#[derive(Debug, Serialize)]
struct CycleReport {
    cycle: String,
    cycle_ts: NaiveDateTime,
    lines: usize,
    total_sanction: f64,
    conserved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    load: Option<LoadReport>,
}

pub fn cmd_run(
    settings: &Settings,
    data_dir: PathBuf,
    today: Option<NaiveDate>,
    dry_run: bool,
    root: Option<PathBuf>,
    strict: bool,
    json: bool,
) -> Result<(), CliError> {
    for category in [ORDERS, DELIVERIES] {
        if !settings.grouping.categories.contains_key(category) {
            return Err(CliError::args(format!("grouping.categories has no '{category}' entry"))
                .with_hint("map it to the directory holding those exports"));
        }
    }

    let groups = complete_groups(&data_dir, &settings.grouping)?;
    if groups.is_empty() {
        return Err(CliError::new(
            EXIT_INPUT_NO_CYCLES,
            format!("{}: no complete cycle found", data_dir.display()),
        )
        .with_hint("each cycle needs one YYYY-MM-DD-HH-prefixed file per category"));
    }

    let registry = SchemaRegistry::new(settings.kinds());
    let options = recon_options(settings, today_or_local(today));
    let wh = warehouse(settings, root);

    let mut reports = Vec::with_capacity(groups.len());
    for group in &groups {
        tracing::info!("cycle {}", group.id);
        let (mut report, ledger_table) = reconcile_cycle(&registry, group, &options, strict)?;
        if !dry_run {
            report.load = Some(wh.upsert(
                &ledger_table,
                &settings.warehouse.schema,
                &settings.warehouse.ledger_table,
                settings.warehouse.ledger_key.as_slice(),
            )?);
        }
        reports.push(report);
    }

    if json {
        return print_json(&reports);
    }
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    for r in &reports {
        let loaded = match &r.load {
            Some(l) => format!("{} row(s) sent", l.rows_attempted),
            None => "not loaded".to_string(),
        };
        writeln!(
            handle,
            "{}: {} line(s), sanction {:.2}, {}{}",
            r.cycle,
            r.lines,
            r.total_sanction,
            loaded,
            if r.conserved { "" } else { ", totals mismatch" }
        )
        .map_err(|e| CliError::io(e.to_string()))?;
    }
    Ok(())
}

fn reconcile_cycle(
    registry: &SchemaRegistry,
    group: &CycleGroup,
    options: &ReconOptions,
    strict: bool,
) -> Result<(CycleReport, Table), CliError> {
    let orders = load_category(registry, group, ORDERS)?;
    let deliveries = load_category(registry, group, DELIVERIES)?;
    let (ledger, conservation) = build_ledger(&orders, &deliveries, options, strict)?;
    let report = CycleReport {
        cycle: group.id.clone(),
        cycle_ts: group.cycle_ts,
        lines: ledger.summary.lines,
        total_sanction: ledger.summary.total_sanction,
        conserved: conservation.is_conserved(),
        load: None,
    };
    Ok((report, ledger.to_table()?))
}

/// Classified, normalized table for one category, stamped with the cycle
/// timestamp when the export does not carry one.
fn load_category(registry: &SchemaRegistry, group: &CycleGroup, category: &str) -> Result<Table, CliError> {
    let path: &Path = group
        .file(category)
        .ok_or_else(|| CliError::io(format!("cycle {}: no {category} file", group.id)))?;
    let loaded = registry.load(path, DEFAULT_HEADER_SCAN)?;
    if loaded.kind != category {
        tracing::debug!("{}: kind '{}' used as {category}", path.display(), loaded.kind);
    }
    let mut table = loaded.table;
    if table.column_index(CYCLE_TS).is_none() {
        table
            .add_column(CYCLE_TS, Value::DateTime(group.cycle_ts))
            .map_err(|e| CliError::io(e.to_string()))?;
    }
    Ok(table)
}
