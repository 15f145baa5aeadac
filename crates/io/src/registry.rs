//! Schema registry: declared header lists mapped to table kinds.
//!
//! Classification is exact. A header row either equals a declared list
//! (after trimming and dropping blank cells) or the table is
//! [`Classification::Unclassified`]; nothing is guessed from file names.

use std::collections::BTreeMap;
use std::path::Path;

use procledger_core::{normalize, ColumnRule, Table, Value};
use serde::{Deserialize, Serialize};

use crate::error::IoError;
use crate::sheet::{read_rows, table_from_rows};

/// Rows searched for a header when a sheet carries banner lines on top.
pub const DEFAULT_HEADER_SCAN: usize = 11;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindSpec {
    pub name: String,
    /// Exact, ordered source headers.
    pub headers: Vec<String>,
    /// Source header -> canonical column name.
    #[serde(default)]
    pub renames: BTreeMap<String, String>,
    /// Normalization applied after renaming, by canonical name.
    #[serde(default)]
    pub rules: Vec<ColumnRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Kind(String),
    Unclassified,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    kinds: Vec<KindSpec>,
}

/// A file loaded through the registry.
#[derive(Debug, Clone)]
pub struct ClassifiedTable {
    pub kind: String,
    pub header_row: usize,
    pub table: Table,
}

impl SchemaRegistry {
    pub fn new(kinds: Vec<KindSpec>) -> Self {
        Self { kinds }
    }

    pub fn kinds(&self) -> &[KindSpec] {
        &self.kinds
    }

    pub fn get(&self, name: &str) -> Option<&KindSpec> {
        self.kinds.iter().find(|k| k.name == name)
    }

    pub fn classify<S: AsRef<str>>(&self, headers: &[S]) -> Classification {
        let cleaned = clean_headers(headers.iter().map(AsRef::as_ref));
        self.match_cleaned(&cleaned)
            .map(|k| Classification::Kind(k.name.clone()))
            .unwrap_or(Classification::Unclassified)
    }

    /// First row within `max_scan` whose cells classify, with its kind.
    pub fn locate_header_row(&self, rows: &[Vec<Value>], max_scan: usize) -> Option<(usize, &KindSpec)> {
        rows.iter().take(max_scan).enumerate().find_map(|(i, row)| {
            let texts: Vec<String> = row.iter().filter_map(Value::as_text).collect();
            let cleaned = clean_headers(texts.iter().map(String::as_str));
            self.match_cleaned(&cleaned).map(|k| (i, k))
        })
    }

    /// Read, locate header, rename and normalize one file.
    pub fn load(&self, path: &Path, max_scan: usize) -> Result<ClassifiedTable, IoError> {
        let rows = read_rows(path)?;
        let (header_row, kind) = self
            .locate_header_row(&rows, max_scan)
            .ok_or_else(|| IoError::Unclassified {
                path: path.to_path_buf(),
                scanned: max_scan.min(rows.len()),
            })?;
        let kind = kind.clone();
        let mut table = table_from_rows(path, rows, header_row)?;
        apply_renames(&mut table, &kind)?;
        let table = normalize(&table, &kind.rules);
        log::debug!(
            "{}: kind '{}', header at row {header_row}, {} row(s)",
            path.display(),
            kind.name,
            table.len()
        );
        Ok(ClassifiedTable {
            kind: kind.name,
            header_row,
            table,
        })
    }

    fn match_cleaned(&self, cleaned: &[&str]) -> Option<&KindSpec> {
        if cleaned.is_empty() {
            return None;
        }
        self.kinds.iter().find(|k| {
            k.headers.len() == cleaned.len()
                && k.headers.iter().zip(cleaned).all(|(a, b)| a.trim() == *b)
        })
    }
}

/// Rename source headers to the kind's canonical names. Trimmed headers
/// are matched, so `" Pedido "` picks up the rename for `"Pedido"`.
pub fn apply_renames(table: &mut Table, kind: &KindSpec) -> Result<(), IoError> {
    let renames: BTreeMap<String, String> = table
        .columns()
        .iter()
        .filter_map(|c| kind.renames.get(c.trim()).map(|to| (c.clone(), to.clone())))
        .collect();
    table.rename_columns(&renames)?;
    Ok(())
}

fn clean_headers<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    headers
        .map(str::trim)
        .filter(|h| !h.is_empty() && !h.eq_ignore_ascii_case("nan"))
        .collect()
}
