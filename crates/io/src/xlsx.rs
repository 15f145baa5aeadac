// Excel import (xlsx, xlsm, xls, xlsb, ods) via calamine

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use procledger_core::normalize::excel_serial;
use procledger_core::{Table, Value};

use crate::error::IoError;
use crate::sheet::table_from_rows;

/// Import one sheet (the first when `sheet` is `None`) with its first row as header.
pub fn import(path: &Path, sheet: Option<&str>) -> Result<Table, IoError> {
    let rows = read_rows(path, sheet)?;
    table_from_rows(path, rows, 0)
}

/// Typed cells of one sheet, anchored at A1 so row numbers match the file.
pub fn read_rows(path: &Path, sheet: Option<&str>) -> Result<Vec<Vec<Value>>, IoError> {
    let excel_err = |message: String| IoError::Excel {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook: Sheets<_> =
        open_workbook_auto(path).map_err(|e| excel_err(format!("failed to open workbook: {e}")))?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| excel_err("workbook contains no sheets".into()))?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| excel_err(format!("failed to read sheet '{sheet_name}': {e}")))?;

    // Range start offset (data may not begin at A1)
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<Value>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut out = vec![Value::Null; start_col as usize];
        out.extend(row.iter().map(cell_value));
        rows.push(out);
    }
    log::debug!("{}: read {} row(s) from sheet '{sheet_name}'", path.display(), rows.len());
    Ok(rows)
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) => Value::text(s.clone()),
        Data::Float(n) => Value::Decimal(*n),
        Data::Int(n) => Value::Int(*n),
        Data::Bool(b) => Value::Bool(*b),
        // 1900 date system assumed
        Data::DateTime(dt) => match excel_serial(dt.as_f64()) {
            Some(ts) if ts.time() == chrono::NaiveTime::MIN => Value::Date(ts.date()),
            Some(ts) => Value::DateTime(ts),
            None => Value::Null,
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::text(s.clone()),
        Data::Error(_) => Value::Null,
    }
}
