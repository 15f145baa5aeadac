use std::collections::HashSet;
use std::path::{Path, PathBuf};

use procledger_core::{ColumnType, Table, Value};
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;

use super::identifier::{normalize_identifier, normalize_identifiers, quote};
use super::sanitize::{residual_marker_columns, sanitize};
use super::sql::{self, BoundKey, SqlCell};
use crate::error::LoadError;

/// Outcome of one [`Warehouse::upsert`].
///
/// `rows_attempted` counts rows sent to storage. Rows whose key already
/// existed are skipped by the storage engine and are still counted here;
/// use [`Warehouse::count_rows`] for the persisted total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub schema: String,
    pub table: String,
    pub rows_attempted: usize,
    pub duplicates_dropped: usize,
    pub null_key_rows: usize,
    pub schema_created: bool,
    pub table_created: bool,
}

/// A directory of SQLite files, one per schema.
///
/// Holds no connection. Each call opens its own and drops it on return.
#[derive(Debug, Clone)]
pub struct Warehouse {
    root: PathBuf,
}

impl Warehouse {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn schema_path(&self, schema: &str) -> PathBuf {
        self.root.join(format!("{}.sqlite", normalize_identifier(schema)))
    }

    /// Create-if-absent `schema.table` keyed on `primary_keys`, then insert
    /// every row of `table` whose key is new. Never updates, never alters.
    pub fn upsert<S: AsRef<str>>(
        &self,
        table: &Table,
        schema: &str,
        table_name: &str,
        primary_keys: &[S],
    ) -> Result<LoadReport, LoadError> {
        let schema = normalize_identifier(schema);
        let table_name = normalize_identifier(table_name);
        let target = Target {
            schema: &schema,
            table: &table_name,
        };

        if primary_keys.is_empty() {
            return Err(LoadError::NoPrimaryKey {
                schema: schema.clone(),
                table: table_name.clone(),
            });
        }

        let columns = normalize_identifiers(table.columns());
        let keys: Vec<String> = primary_keys
            .iter()
            .map(|k| normalize_identifier(k.as_ref()))
            .collect();
        let mut key_idx = Vec::with_capacity(keys.len());
        for (key, raw) in keys.iter().zip(primary_keys) {
            let idx = columns.iter().position(|c| c == key).ok_or_else(|| LoadError::MissingKeyColumn {
                schema: schema.clone(),
                table: table_name.clone(),
                column: raw.as_ref().to_string(),
            })?;
            key_idx.push(idx);
        }

        let mut clean = sanitize(table);
        clean
            .set_columns(columns.clone())
            .map_err(|e| target.invalid(e.to_string()))?;
        let residual = residual_marker_columns(&clean);
        if !residual.is_empty() {
            return Err(LoadError::ResidualMissingMarker {
                schema: schema.clone(),
                table: table_name.clone(),
                columns: residual,
            });
        }

        let (rows, duplicates_dropped, null_key_rows) = dedupe_by_key(clean.rows(), &key_idx);
        if null_key_rows > 0 {
            log::warn!("{schema}.{table_name}: {null_key_rows} row(s) with a null key part dropped");
        }

        std::fs::create_dir_all(&self.root).map_err(|source| LoadError::Root {
            path: self.root.clone(),
            source,
        })?;
        let schema_file = self.schema_path(&schema);
        let schema_created = !schema_file.exists();

        let mut conn = Connection::open_in_memory().map_err(target.storage("opening connection"))?;
        attach(&conn, &schema_file, &schema).map_err(target.storage("creating schema"))?;

        let tx = conn.transaction().map_err(target.storage("starting transaction"))?;

        let existing = existing_columns(&tx, &schema, &table_name).map_err(target.storage("reading table"))?;
        let table_created = existing.is_empty();
        if table_created {
            let typed: Vec<(String, ColumnType)> = columns
                .iter()
                .enumerate()
                .map(|(i, c)| (c.clone(), clean.column_type(i)))
                .collect();
            tx.execute_batch(&sql::create_table(&schema, &table_name, &typed, &keys))
                .map_err(target.storage("creating table"))?;
            log::info!("{schema}.{table_name}: created with key ({})", keys.join(", "));
        } else {
            let unknown: Vec<String> = columns
                .iter()
                .filter(|c| !existing.contains(*c))
                .cloned()
                .collect();
            if !unknown.is_empty() {
                return Err(LoadError::ColumnMismatch {
                    schema: schema.clone(),
                    table: table_name.clone(),
                    columns: unknown,
                });
            }
        }

        let per_statement = sql::rows_per_statement(columns.len());
        for chunk in rows.chunks(per_statement) {
            let statement = sql::insert(&schema, &table_name, &columns, chunk.len());
            let params = chunk.iter().flat_map(|row| row.iter().map(SqlCell));
            tx.execute(&statement, params_from_iter(params))
                .map_err(target.storage("inserting rows"))?;
        }
        tx.commit().map_err(target.storage("committing"))?;

        log::info!(
            "{schema}.{table_name}: {} row(s) sent, {duplicates_dropped} duplicate(s) dropped",
            rows.len()
        );

        Ok(LoadReport {
            schema,
            table: table_name,
            rows_attempted: rows.len(),
            duplicates_dropped,
            null_key_rows,
            schema_created,
            table_created,
        })
    }

    /// Rows persisted in `schema.table`; 0 when either does not exist.
    pub fn count_rows(&self, schema: &str, table_name: &str) -> Result<u64, LoadError> {
        let schema = normalize_identifier(schema);
        let table_name = normalize_identifier(table_name);
        let target = Target {
            schema: &schema,
            table: &table_name,
        };
        let schema_file = self.schema_path(&schema);
        if !schema_file.exists() {
            return Ok(0);
        }
        let conn = Connection::open_in_memory().map_err(target.storage("opening connection"))?;
        attach(&conn, &schema_file, &schema).map_err(target.storage("attaching schema"))?;
        if existing_columns(&conn, &schema, &table_name)
            .map_err(target.storage("reading table"))?
            .is_empty()
        {
            return Ok(0);
        }
        let count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}", sql::qualified(&schema, &table_name)),
                [],
                |row| row.get(0),
            )
            .map_err(target.storage("counting rows"))?;
        Ok(count.max(0) as u64)
    }

    /// Whole `schema.table` as a table, in insertion order.
    pub fn read_table(&self, schema: &str, table_name: &str) -> Result<Table, LoadError> {
        let schema = normalize_identifier(schema);
        let table_name = normalize_identifier(table_name);
        let target = Target {
            schema: &schema,
            table: &table_name,
        };
        let schema_file = self.schema_path(&schema);
        if !schema_file.exists() {
            return Ok(Table::default());
        }
        let conn = Connection::open_in_memory().map_err(target.storage("opening connection"))?;
        attach(&conn, &schema_file, &schema).map_err(target.storage("attaching schema"))?;
        let columns = existing_columns(&conn, &schema, &table_name).map_err(target.storage("reading table"))?;
        if columns.is_empty() {
            return Ok(Table::default());
        }

        let mut stmt = conn
            .prepare(&format!("SELECT * FROM {} ORDER BY rowid", sql::qualified(&schema, &table_name)))
            .map_err(target.storage("reading rows"))?;
        let width = columns.len();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(sql::from_sql))
                    .collect::<rusqlite::Result<Vec<Value>>>()
            })
            .map_err(target.storage("reading rows"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(target.storage("reading rows"))?;
        Table::from_rows(columns, rows).map_err(|e| target.invalid(e.to_string()))
    }
}

struct Target<'a> {
    schema: &'a str,
    table: &'a str,
}

impl Target<'_> {
    fn storage(&self, context: &str) -> impl FnOnce(rusqlite::Error) -> LoadError {
        let schema = self.schema.to_string();
        let table = self.table.to_string();
        let context = context.to_string();
        move |source| LoadError::Storage {
            schema,
            table,
            context,
            source,
        }
    }

    fn invalid(&self, name: String) -> LoadError {
        LoadError::InvalidIdentifier {
            schema: self.schema.to_string(),
            table: self.table.to_string(),
            name,
        }
    }
}

pub(super) fn attach(conn: &Connection, file: &Path, schema: &str) -> rusqlite::Result<()> {
    conn.execute(
        &format!("ATTACH DATABASE ?1 AS {}", quote(schema)),
        [file.to_string_lossy().into_owned()],
    )?;
    Ok(())
}

/// Column names of `schema.table`, empty when the table does not exist.
fn existing_columns(conn: &Connection, schema: &str, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA {}.table_info({})", quote(schema), quote(table)))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

/// Keep the last row per key, in the order those last rows appear. Keys are
/// compared as bound, so in-batch duplicates are exactly the rows storage
/// would reject. Rows with any null key part are dropped. Returns
/// `(rows, duplicates, null_keys)`.
fn dedupe_by_key(rows: &[Vec<Value>], key_idx: &[usize]) -> (Vec<Vec<Value>>, usize, usize) {
    let mut seen: HashSet<Vec<BoundKey>> = HashSet::new();
    let mut kept = Vec::with_capacity(rows.len());
    let mut duplicates = 0;
    let mut null_keys = 0;
    for row in rows.iter().rev() {
        let key: Option<Vec<BoundKey>> = key_idx.iter().map(|&i| sql::bound_key(&row[i])).collect();
        match key {
            None => null_keys += 1,
            Some(key) => {
                if seen.insert(key) {
                    kept.push(row.clone());
                } else {
                    duplicates += 1;
                }
            }
        }
    }
    kept.reverse();
    (kept, duplicates, null_keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_keeps_last_occurrence() {
        let rows = vec![
            vec![Value::text("A"), Value::Int(1)],
            vec![Value::text("B"), Value::Int(2)],
            vec![Value::Null, Value::Int(9)],
            vec![Value::text("A"), Value::Int(3)],
        ];
        let (kept, dups, nulls) = dedupe_by_key(&rows, &[0]);
        assert_eq!(kept, vec![rows[1].clone(), rows[3].clone()]);
        assert_eq!(dups, 1);
        assert_eq!(nulls, 1);
    }

    #[test]
    fn dedupe_compares_keys_as_stored() {
        let rows = vec![
            vec![Value::Int(1), Value::text("a")],
            vec![Value::text("1.0"), Value::text("b")],
            vec![Value::Decimal(1.0), Value::text("c")],
        ];
        let (kept, dups, _) = dedupe_by_key(&rows, &[0]);
        assert_eq!(kept, vec![rows[1].clone(), rows[2].clone()]);
        assert_eq!(dups, 1);
    }
}
