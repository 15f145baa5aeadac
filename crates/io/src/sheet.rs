// Format dispatch and raw rows -> Table

use std::path::Path;

use procledger_core::{Table, Value};

use crate::error::IoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    Excel,
}

impl SheetFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "txt" | "tsv" => Some(Self::Csv),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(Self::Excel),
            _ => None,
        }
    }
}

/// Raw rows of the first sheet (or the whole CSV), header not yet located.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<Value>>, IoError> {
    match SheetFormat::from_path(path) {
        Some(SheetFormat::Csv) => crate::csv::read_rows(path),
        Some(SheetFormat::Excel) => crate::xlsx::read_rows(path, None),
        None => Err(IoError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Load a file whose first row is the header.
pub fn import(path: &Path) -> Result<Table, IoError> {
    let rows = read_rows(path)?;
    table_from_rows(path, rows, 0)
}

/// Build a table from raw rows using row `header_row` as header.
///
/// Rows above the header are dropped, blank rows skipped, short rows padded
/// with nulls and long rows truncated. Blank header cells become
/// `column_<n>`; repeated names get `_2`, `_3` suffixes.
pub fn table_from_rows(
    path: &Path,
    mut rows: Vec<Vec<Value>>,
    header_row: usize,
) -> Result<Table, IoError> {
    if header_row >= rows.len() {
        return Err(IoError::Empty(path.to_path_buf()));
    }
    let body = rows.split_off(header_row + 1);
    let header = rows.pop().unwrap_or_default();
    let columns = header_names(&header);
    let width = columns.len();

    let mut table = Table::new(columns);
    for mut row in body {
        if row.iter().all(|v| v.as_text().is_none()) {
            continue;
        }
        row.resize(width, Value::Null);
        table.push_row(row)?;
    }
    Ok(table)
}

pub(crate) fn header_names(header: &[Value]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(header.len());
    for (i, cell) in header.iter().enumerate() {
        let base = cell.as_text().unwrap_or_else(|| format!("column_{}", i + 1));
        let mut name = base.clone();
        let mut n = 2;
        while names.contains(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }
        names.push(name);
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_row_offset_and_padding() {
        let rows = vec![
            vec![Value::text("Report generated 2025-01-20")],
            vec![Value::text("id"), Value::text("qty"), Value::Null, Value::text("id")],
            vec![Value::text("A"), Value::text("1")],
            vec![Value::Null, Value::text(" ")],
            vec![Value::text("B"), Value::text("2"), Value::text("x"), Value::text("y"), Value::text("z")],
        ];
        let table = table_from_rows(Path::new("t.csv"), rows, 1).unwrap();
        assert_eq!(table.columns(), &["id", "qty", "column_3", "id_2"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0][3], Value::Null);
        assert_eq!(table.cell(1, "id_2"), Some(&Value::text("y")));
    }

    #[test]
    fn header_past_end_is_empty() {
        let err = table_from_rows(Path::new("t.csv"), vec![], 0).unwrap_err();
        assert!(matches!(err, IoError::Empty(_)));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(SheetFormat::from_path(Path::new("a.XLSX")), Some(SheetFormat::Excel));
        assert_eq!(SheetFormat::from_path(Path::new("a.csv")), Some(SheetFormat::Csv));
        assert_eq!(SheetFormat::from_path(Path::new("a.pdf")), None);
    }
}
