// In-memory tabular record: ordered named columns, ordered typed rows

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::TableError;
use crate::value::{ColumnType, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a table, checking that every row is exactly as wide as the header.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, TableError> {
        let mut table = Self::new(columns);
        table.check_unique_columns()?;
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Value>>) {
        (self.columns, self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Resolve every name to its index, failing on the first absent one.
    /// `table` labels the input in the error (e.g. `orders`).
    pub fn require_columns(&self, table: &str, names: &[&str]) -> Result<Vec<usize>, TableError> {
        names
            .iter()
            .map(|name| {
                self.column_index(name).ok_or_else(|| TableError::MissingColumn {
                    table: table.to_string(),
                    column: (*name).to_string(),
                })
            })
            .collect()
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().filter_map(move |r| r.get(idx))
    }

    pub fn column_type(&self, idx: usize) -> ColumnType {
        ColumnType::infer(self.column_values(idx))
    }

    /// Append a column filled with `fill`.
    pub fn add_column(&mut self, name: impl Into<String>, fill: Value) -> Result<(), TableError> {
        let name = name.into();
        if self.column_index(&name).is_some() {
            return Err(TableError::DuplicateColumn(name));
        }
        self.columns.push(name);
        for row in &mut self.rows {
            row.push(fill.clone());
        }
        Ok(())
    }

    /// Rename columns through `renames` (old -> new). Unlisted columns keep their name.
    pub fn rename_columns(&mut self, renames: &BTreeMap<String, String>) -> Result<(), TableError> {
        for column in &mut self.columns {
            if let Some(new_name) = renames.get(column.as_str()) {
                *column = new_name.clone();
            }
        }
        self.check_unique_columns()
    }

    /// Replace every header at once, e.g. after identifier normalization.
    pub fn set_columns(&mut self, columns: Vec<String>) -> Result<(), TableError> {
        if columns.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                row: 0,
                expected: self.columns.len(),
                found: columns.len(),
            });
        }
        self.columns = columns;
        self.check_unique_columns()
    }

    pub fn set_cell(&mut self, row: usize, idx: usize, value: Value) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(idx)) {
            *cell = value;
        }
    }

    /// Apply `f` to every cell in place.
    pub fn map_cells(&mut self, mut f: impl FnMut(Value) -> Value) {
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                let value = std::mem::replace(cell, Value::Null);
                *cell = f(value);
            }
        }
    }

    /// Keep only rows for which `keep` returns true.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&[Value]) -> bool) {
        self.rows.retain(|r| keep(r));
    }

    /// Rows whose `column` equals `value`, as a new table with the same header.
    pub fn filter_eq(&self, column: &str, value: &Value) -> Table {
        let Some(idx) = self.column_index(column) else {
            return Table::new(self.columns.clone());
        };
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| &r[idx] == value)
                .cloned()
                .collect(),
        }
    }

    fn check_unique_columns(&self) -> Result<(), TableError> {
        for (i, c) in self.columns.iter().enumerate() {
            if self.columns[..i].contains(c) {
                return Err(TableError::DuplicateColumn(c.clone()));
            }
        }
        Ok(())
    }
}
