// CSV import/export

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use procledger_core::{Table, Value};
use regex::Regex;

use crate::error::IoError;
use crate::sheet::table_from_rows;

/// Import a delimited file whose first row is the header.
pub fn import(path: &Path) -> Result<Table, IoError> {
    let rows = read_rows(path)?;
    table_from_rows(path, rows, 0)
}

/// Every record of the file as raw text cells; empty fields are `Null`.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<Value>>, IoError> {
    let content = read_file_as_utf8(path)?;
    let dialect = sniff_dialect(&content);
    if dialect.decimal_comma {
        log::debug!("{}: ';' separated with decimal commas", path.display());
    }
    parse_rows(&content, dialect).map_err(|source| IoError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

/// How a delimited export spells records and numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
    /// Numbers are written `1.234,50`, as spreadsheets do in comma-decimal
    /// locales. Only ever set for `;` files.
    pub decimal_comma: bool,
}

const SNIFF_LINES: usize = 20;

fn decimal_comma_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^-?(\d{1,3}(\.\d{3})+|\d+),\d+$").expect("decimal comma pattern is valid")
    })
}

/// Records of `sample` split on `delimiter`, quote-aware.
fn sample_records(sample: &str, delimiter: u8) -> Vec<csv::StringRecord> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(sample.as_bytes())
        .records()
        .filter_map(Result::ok)
        .collect()
}

/// Pick the delimiter whose most common field count (above one) covers the
/// most sampled lines, weighted by that count. Banner lines above the header
/// do not vote because they fall outside the common count.
pub fn sniff_delimiter(content: &str) -> u8 {
    let sample = sample(content);
    let mut best = b',';
    let mut best_score = 0usize;
    for delimiter in [b',', b';', b'\t', b'|'] {
        let mut by_width: BTreeMap<usize, usize> = BTreeMap::new();
        for record in sample_records(&sample, delimiter) {
            if record.len() > 1 {
                *by_width.entry(record.len()).or_default() += 1;
            }
        }
        let score = by_width.iter().map(|(width, lines)| width * lines).max().unwrap_or(0);
        if score > best_score {
            best_score = score;
            best = delimiter;
        }
    }
    best
}

/// Delimiter plus number spelling. A `;` file uses decimal commas when any
/// sampled field looks like `12,5` or `1.234,50`.
pub fn sniff_dialect(content: &str) -> Dialect {
    let delimiter = sniff_delimiter(content);
    let decimal_comma = delimiter == b';'
        && sample_records(&sample(content), delimiter)
            .iter()
            .flat_map(|r| r.iter())
            .any(|field| decimal_comma_pattern().is_match(field.trim()));
    Dialect {
        delimiter,
        decimal_comma,
    }
}

fn sample(content: &str) -> String {
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

/// `1.234,50` -> `1234.50`; anything else unchanged.
fn to_decimal_point(field: &str) -> String {
    let trimmed = field.trim();
    if decimal_comma_pattern().is_match(trimmed) {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        field.to_string()
    }
}

/// Read file and convert to UTF-8 if needed (Excel exports are often Windows-1252).
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let read_err = |source| IoError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::File::open(path).map_err(read_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(read_err)?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(s)),
        Err(e) => {
            let bytes = e.into_bytes();
            log::debug!("{}: not UTF-8, decoding as Windows-1252", path.display());
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

fn parse_rows(content: &str, dialect: Dialect) -> Result<Vec<Vec<Value>>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(dialect.delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Value::Null
                    } else if dialect.decimal_comma {
                        Value::text(to_decimal_point(field))
                    } else {
                        Value::text(field)
                    }
                })
                .collect(),
        );
    }
    Ok(rows)
}

/// Write `table` with a header row. Nulls are written as empty fields.
pub fn export(table: &Table, path: &Path) -> Result<(), IoError> {
    let csv_err = |source| IoError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::WriterBuilder::new().from_path(path).map_err(csv_err)?;
    writer.write_record(table.columns()).map_err(csv_err)?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(|v| v.to_string()))
            .map_err(csv_err)?;
    }
    writer.flush().map_err(|source| IoError::Write {
        path: path.to_path_buf(),
        source,
    })
}
