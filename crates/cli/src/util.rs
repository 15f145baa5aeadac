// Shared helpers for command implementations

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use procledger_config::Settings;
use procledger_core::Table;
use procledger_io::Warehouse;
use serde::Serialize;

use crate::CliError;

/// Print one JSON value on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| CliError::io(e.to_string()))?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", json).map_err(|e| CliError::io(e.to_string()))
}

pub fn today_or_local(today: Option<NaiveDate>) -> NaiveDate {
    today.unwrap_or_else(|| Local::now().date_naive())
}

/// A table whose header is on the first row.
pub fn read_table(path: &Path) -> Result<Table, CliError> {
    Ok(procledger_io::sheet::import(path)?)
}

pub fn write_table(table: &Table, path: &Path) -> Result<(), CliError> {
    procledger_io::csv::export(table, path)?;
    tracing::info!("wrote {} row(s) to {}", table.len(), path.display());
    Ok(())
}

pub fn warehouse(settings: &Settings, root: Option<PathBuf>) -> Warehouse {
    Warehouse::new(root.unwrap_or_else(|| settings.warehouse.root.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_today_wins() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
        assert_eq!(today_or_local(Some(day)), day);
    }

    #[test]
    fn root_override_beats_config() {
        let settings = Settings::default();
        let wh = warehouse(&settings, Some(PathBuf::from("/tmp/wh")));
        assert_eq!(wh.root(), Path::new("/tmp/wh"));
        assert_eq!(warehouse(&settings, None).root(), settings.warehouse.root.as_path());
    }
}
