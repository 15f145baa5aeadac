//! SQL text and parameter binding for the warehouse.

use procledger_core::{ColumnType, Value};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};

use super::identifier::quote;

/// Bound-parameter ceiling of the bundled SQLite.
pub const MAX_PARAMS: usize = 32_766;

pub fn storage_type(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Integer => "BIGINT",
        ColumnType::Decimal => "DOUBLE PRECISION",
        ColumnType::Date | ColumnType::Timestamp => "TIMESTAMP",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::Text => "TEXT",
    }
}

pub fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote(schema), quote(table))
}

/// `CREATE TABLE IF NOT EXISTS` with a composite primary key; key columns are NOT NULL.
pub fn create_table(schema: &str, table: &str, columns: &[(String, ColumnType)], keys: &[String]) -> String {
    let mut defs: Vec<String> = columns
        .iter()
        .map(|(name, ty)| {
            let not_null = if keys.contains(name) { " NOT NULL" } else { "" };
            format!("{} {}{not_null}", quote(name), storage_type(*ty))
        })
        .collect();
    let key_list: Vec<String> = keys.iter().map(|k| quote(k)).collect();
    defs.push(format!("PRIMARY KEY ({})", key_list.join(", ")));
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        qualified(schema, table),
        defs.join(",\n    ")
    )
}

/// Multi-row insert that skips rows whose key already exists.
pub fn insert(schema: &str, table: &str, columns: &[String], rows: usize) -> String {
    let column_list: Vec<String> = columns.iter().map(|c| quote(c)).collect();
    let placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![placeholders; rows].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES {} ON CONFLICT DO NOTHING",
        qualified(schema, table),
        column_list.join(", "),
        values
    )
}

/// Rows per statement so that `rows * width` stays under [`MAX_PARAMS`].
pub fn rows_per_statement(width: usize) -> usize {
    (MAX_PARAMS / width.max(1)).max(1)
}

/// Storage value of a cell. Dates go in as `YYYY-MM-DD HH:MM:SS` text,
/// booleans as 0/1.
pub fn bind(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Int(n) => SqlValue::Integer(*n),
        Value::Decimal(n) => SqlValue::Real(*n),
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Date(d) => SqlValue::Text(d.format("%Y-%m-%d 00:00:00").to_string()),
        Value::DateTime(dt) => SqlValue::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
    }
}

pub struct SqlCell<'a>(pub &'a Value);

impl ToSql for SqlCell<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            other => ToSqlOutput::Owned(bind(other)),
        })
    }
}

/// Identity of a bound key cell under SQLite's equality: `1` and `1.0`
/// are one key, `1` and `'1.0'` are two.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoundKey {
    Integer(i64),
    Real(u64),
    Text(String),
}

/// `None` for a NULL cell.
pub fn bound_key(value: &Value) -> Option<BoundKey> {
    match bind(value) {
        SqlValue::Null => None,
        SqlValue::Integer(n) => Some(BoundKey::Integer(n)),
        SqlValue::Real(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Some(BoundKey::Integer(n as i64)),
        SqlValue::Real(n) => Some(BoundKey::Real(n.to_bits())),
        SqlValue::Text(s) => Some(BoundKey::Text(s)),
        SqlValue::Blob(b) => Some(BoundKey::Text(String::from_utf8_lossy(&b).into_owned())),
    }
}

/// Read back a stored cell.
pub fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Int(n),
        ValueRef::Real(n) => Value::Decimal(n),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Value::text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_table_marks_keys() {
        let sql = create_table(
            "procurement",
            "ledger",
            &[("order_id".into(), ColumnType::Text), ("qty".into(), ColumnType::Decimal)],
            &["order_id".into()],
        );
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"procurement\".\"ledger\""));
        assert!(sql.contains("\"order_id\" TEXT NOT NULL"));
        assert!(sql.contains("\"qty\" DOUBLE PRECISION,"));
        assert!(sql.ends_with("PRIMARY KEY (\"order_id\")\n)"));
    }

    #[test]
    fn insert_has_one_group_per_row() {
        let sql = insert("s", "t", &["a".into(), "b".into()], 2);
        assert_eq!(
            sql,
            "INSERT INTO \"s\".\"t\" (\"a\", \"b\") VALUES (?, ?), (?, ?) ON CONFLICT DO NOTHING"
        );
    }

    #[test]
    fn bound_keys_follow_storage_equality() {
        assert_eq!(bound_key(&Value::Int(1)), bound_key(&Value::Decimal(1.0)));
        assert_ne!(bound_key(&Value::Int(1)), bound_key(&Value::text("1.0")));
        assert_ne!(bound_key(&Value::Decimal(1.5)), bound_key(&Value::text("1.5")));
        assert_eq!(bound_key(&Value::Bool(true)), Some(BoundKey::Integer(1)));
        assert_eq!(bound_key(&Value::Null), None);
    }

    #[test]
    fn chunk_size_respects_param_limit() {
        assert_eq!(rows_per_statement(23), 32_766 / 23);
        assert_eq!(rows_per_statement(0), 32_766);
        assert_eq!(rows_per_statement(40_000), 1);
    }
}
