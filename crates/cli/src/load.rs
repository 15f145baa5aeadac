//! `procledger load`: append a file to a warehouse table, skipping known keys.

use std::io::Write;
use std::path::PathBuf;

use procledger_config::Settings;
use procledger_core::infer_types;
use procledger_io::LoadReport;

use crate::util::{print_json, read_table, warehouse};
use crate::CliError;

pub fn cmd_load(
    settings: &Settings,
    file: PathBuf,
    schema: String,
    table: String,
    key: Vec<String>,
    root: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    let key: Vec<String> = key
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if key.is_empty() {
        return Err(CliError::args("--key needs at least one column").with_hint("--key order_id,delivery_key"));
    }

    let input = infer_types(&read_table(&file)?, &settings.dates.format);
    let wh = warehouse(settings, root);
    let report = wh.upsert(&input, &schema, &table, key.as_slice())?;
    let total = wh.count_rows(&report.schema, &report.table)?;
    if report.null_key_rows > 0 {
        tracing::warn!(
            "{} of {} row(s) skipped: empty value in key column(s) {}",
            report.null_key_rows,
            input.len(),
            key.join(", ")
        );
    }

    if json {
        #[derive(serde::Serialize)]
        struct LoadOutput<'a> {
            #[serde(flatten)]
            report: &'a LoadReport,
            rows_in_table: u64,
        }
        return print_json(&LoadOutput {
            report: &report,
            rows_in_table: total,
        });
    }
    print_report(&report, total)
}

pub fn print_report(report: &LoadReport, total: u64) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(
        handle,
        "{}.{}: {} row(s) sent, {} duplicate(s) dropped, {} null-key row(s) dropped, {} row(s) in table",
        report.schema, report.table, report.rows_attempted, report.duplicates_dropped, report.null_key_rows, total
    )
    .map_err(|e| CliError::io(e.to_string()))
}
