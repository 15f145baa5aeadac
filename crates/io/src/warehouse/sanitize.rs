//! Last canonicalization pass before a write, and its closed post-condition.

use procledger_core::{Table, Value};

/// Map every spelling of "missing" to `Null` through the canonical predicate.
pub fn sanitize(table: &Table) -> Table {
    let mut out = table.clone();
    out.map_cells(Value::canonicalize);
    out
}

/// Columns still holding `nat`/`nan` text (any case, any padding).
pub fn residual_marker_columns(table: &Table) -> Vec<String> {
    table
        .columns()
        .iter()
        .enumerate()
        .filter(|(idx, _)| table.column_values(*idx).any(Value::is_residual_marker))
        .map(|(_, name)| name.clone())
        .collect()
}
