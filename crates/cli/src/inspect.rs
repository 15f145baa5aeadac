//! `procledger classify`, `enrich`, `compare` and `query`.

use std::io::Write;
use std::path::{Path, PathBuf};

use procledger_config::Settings;
use procledger_core::Table;
use procledger_io::{IoError, SchemaRegistry};
use procledger_recon::compare::{available_cycles, compare_cycles, comparison_table, ComparisonSpec};
use procledger_recon::lookup::{populate, LookupSpec};
use serde::Serialize;

use crate::exit_codes::EXIT_INPUT_UNCLASSIFIED;
use crate::util::{print_json, read_table, warehouse, write_table};
use crate::CliError;

#[derive(Serialize)]
struct ClassifyOutput {
    file: String,
    kind: Option<String>,
    header_row: Option<usize>,
}

pub fn cmd_classify(settings: &Settings, file: PathBuf, max_scan: usize, json: bool) -> Result<(), CliError> {
    let registry = SchemaRegistry::new(settings.kinds());
    let rows = procledger_io::sheet::read_rows(&file)?;
    let found = registry.locate_header_row(&rows, max_scan);

    let output = ClassifyOutput {
        file: file.display().to_string(),
        kind: found.map(|(_, k)| k.name.clone()),
        header_row: found.map(|(row, _)| row),
    };
    if json {
        print_json(&output)?;
    } else if let (Some(kind), Some(row)) = (&output.kind, output.header_row) {
        let stdout = std::io::stdout();
        writeln!(stdout.lock(), "{}: {kind} (header on row {})", output.file, row + 1)
            .map_err(|e| CliError::io(e.to_string()))?;
    }

    if output.kind.is_none() {
        let known: Vec<&str> = registry.kinds().iter().map(|k| k.name.as_str()).collect();
        return Err(CliError::new(
            EXIT_INPUT_UNCLASSIFIED,
            format!(
                "{}: unclassified (no header in the first {} row(s) matches a known kind)",
                output.file,
                max_scan.min(rows.len())
            ),
        )
        .with_hint(format!("known kinds: {}", known.join(", "))));
    }
    Ok(())
}

pub fn cmd_enrich(left: PathBuf, right: PathBuf, spec: &LookupSpec, out: PathBuf) -> Result<(), CliError> {
    let left = read_table(&left)?;
    let right = read_table(&right)?;
    let enriched = populate(&left, &right, spec)?;
    write_table(&enriched, &out)
}

pub struct CompareArgs {
    pub table: Option<PathBuf>,
    pub from_warehouse: bool,
    pub previous: Option<String>,
    pub current: Option<String>,
    pub status_column: String,
    pub amount_column: String,
    pub cycle_column: String,
    pub once_per: Option<String>,
    pub out: Option<PathBuf>,
    pub json: bool,
}

pub fn cmd_compare(settings: &Settings, args: CompareArgs) -> Result<(), CliError> {
    let table = match (&args.table, args.from_warehouse) {
        (_, true) => warehouse(settings, None)
            .read_table(&settings.warehouse.schema, &settings.warehouse.ledger_table)?,
        (Some(path), false) => read_table(path)?,
        (None, false) => return Err(CliError::args("give a table file or --from-warehouse")),
    };

    let cycles = available_cycles(&table, &args.cycle_column);
    let (previous, current) = match (args.previous, args.current) {
        (Some(p), Some(c)) => (p, c),
        (p, c) => {
            let n = cycles.len();
            if n < 2 {
                return Err(CliError::args(format!(
                    "need two cycles to compare, found {n} in column '{}'",
                    args.cycle_column
                )));
            }
            (
                p.unwrap_or_else(|| cycles[n - 2].clone()),
                c.unwrap_or_else(|| cycles[n - 1].clone()),
            )
        }
    };
    for label in [&previous, &current] {
        if !cycles.contains(label) {
            return Err(CliError::args(format!("no cycle '{label}' in column '{}'", args.cycle_column))
                .with_hint(format!("available: {}", cycles.join(", "))));
        }
    }

    let spec = ComparisonSpec {
        status_column: args.status_column,
        amount_column: args.amount_column,
        cycle_column: args.cycle_column,
        once_per: args.once_per,
    };
    let rows = compare_cycles(&table, &spec, &previous, &current)?;

    if let Some(path) = &args.out {
        write_table(&comparison_table(&rows)?, path)?;
    }
    if args.json {
        return print_json(&rows);
    }

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    let w = |e: std::io::Error| CliError::io(e.to_string());
    writeln!(handle, "{previous} -> {current}").map_err(w)?;
    for r in &rows {
        let pct = r.delta_pct.map(|p| format!("{p:+.1}%")).unwrap_or_else(|| "n/a".into());
        writeln!(
            handle,
            "{:<24} {:>14.2} {:>14.2} {:>+14.2} {:>8}",
            r.status, r.previous, r.current, r.delta, pct
        )
        .map_err(w)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct QueryResult {
    query: String,
    #[serde(flatten)]
    table: Table,
}

/// `*.sql` files named by `paths`, directories expanded in name order.
fn sql_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, CliError> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        let read_err = |source| IoError::Read {
            path: path.clone(),
            source,
        };
        let mut found = Vec::new();
        for entry in std::fs::read_dir(path).map_err(read_err)? {
            let file = entry.map_err(read_err)?.path();
            if file.extension().and_then(|e| e.to_str()) == Some("sql") {
                found.push(file);
            }
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

fn query_name(file: &Path) -> String {
    file.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "query".to_string())
}

pub fn cmd_query(
    settings: &Settings,
    paths: &[PathBuf],
    root: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    let files = sql_files(paths)?;
    if files.is_empty() {
        return Err(CliError::args("no .sql files found"));
    }
    if let Some(dir) = &out_dir {
        std::fs::create_dir_all(dir).map_err(|source| IoError::Write {
            path: dir.clone(),
            source,
        })?;
    }

    let wh = warehouse(settings, root);
    let mut results = Vec::with_capacity(files.len());
    for file in &files {
        let statement = std::fs::read_to_string(file).map_err(|source| IoError::Read {
            path: file.clone(),
            source,
        })?;
        if statement.trim().is_empty() {
            tracing::warn!("{}: empty, skipped", file.display());
            continue;
        }
        let name = query_name(file);
        let table = wh.query(&name, &statement)?;
        tracing::info!("{name}: {} row(s)", table.len());
        if let Some(dir) = &out_dir {
            write_table(&table, &dir.join(format!("{name}.csv")))?;
        }
        results.push(QueryResult { query: name, table });
    }

    if json {
        return print_json(&results);
    }
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    let w = |e: std::io::Error| CliError::io(e.to_string());
    for r in &results {
        writeln!(handle, "-- {} ({} row(s))", r.query, r.table.len()).map_err(w)?;
        writeln!(handle, "{}", r.table.columns().join("\t")).map_err(w)?;
        for row in r.table.rows() {
            let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
            writeln!(handle, "{}", cells.join("\t")).map_err(w)?;
        }
    }
    Ok(())
}
