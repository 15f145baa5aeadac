//! Read-only SQL over the whole warehouse.

use std::path::PathBuf;

use procledger_core::{Table, Value};
use rusqlite::Connection;

use super::loader::attach;
use super::sql;
use super::Warehouse;
use crate::error::LoadError;
use crate::sheet::header_names;

impl Warehouse {
    /// Schema names with a store under the root, sorted.
    pub fn schemas(&self) -> Result<Vec<String>, LoadError> {
        if !self.root().is_dir() {
            return Ok(Vec::new());
        }
        let root_err = |source| LoadError::Root {
            path: self.root().to_path_buf(),
            source,
        };
        let mut schemas = Vec::new();
        for entry in std::fs::read_dir(self.root()).map_err(root_err)? {
            let path: PathBuf = entry.map_err(root_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("sqlite") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                schemas.push(stem.to_string());
            }
        }
        schemas.sort();
        Ok(schemas)
    }

    /// Run one statement with every schema attached under its own name, so
    /// tables are addressed as `schema.table`. Statements that would write
    /// are refused before they run.
    pub fn query(&self, name: &str, statement: &str) -> Result<Table, LoadError> {
        let query_err = |e: rusqlite::Error| LoadError::Query {
            name: name.to_string(),
            message: e.to_string(),
        };
        let conn = Connection::open_in_memory().map_err(query_err)?;
        for schema in self.schemas()? {
            attach(&conn, &self.schema_path(&schema), &schema).map_err(query_err)?;
        }

        let statement = statement.trim().trim_end_matches(';').trim_end();
        let mut stmt = conn.prepare(statement).map_err(query_err)?;
        if !stmt.readonly() {
            return Err(LoadError::WriteQuery { name: name.to_string() });
        }

        let header: Vec<Value> = stmt.column_names().into_iter().map(Value::text).collect();
        let columns = header_names(&header);
        let width = columns.len();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(sql::from_sql))
                    .collect::<rusqlite::Result<Vec<Value>>>()
            })
            .map_err(query_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(query_err)?;
        log::debug!("query '{name}': {} row(s)", rows.len());

        Table::from_rows(columns, rows).map_err(|e| LoadError::Query {
            name: name.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded() -> (tempfile::TempDir, Warehouse) {
        let dir = tempfile::tempdir().unwrap();
        let wh = Warehouse::new(dir.path());
        let table = Table::from_rows(
            ["order_id", "status", "amount"],
            vec![
                vec![Value::text("O1"), Value::text("Open"), Value::Decimal(100.0)],
                vec![Value::text("O2"), Value::text("Open"), Value::Decimal(50.0)],
                vec![Value::text("O3"), Value::text("Closed"), Value::Decimal(10.0)],
            ],
        )
        .unwrap();
        wh.upsert(&table, "procurement", "orders", &["order_id"]).unwrap();
        (dir, wh)
    }

    #[test]
    fn queries_address_tables_by_schema() {
        let (_dir, wh) = loaded();
        assert_eq!(wh.schemas().unwrap(), vec!["procurement".to_string()]);
        let result = wh
            .query(
                "by_status",
                "SELECT status, SUM(amount) AS total, status FROM procurement.orders GROUP BY status ORDER BY total DESC;\n",
            )
            .unwrap();
        assert_eq!(result.columns(), &["status", "total", "status_2"]);
        assert_eq!(result.rows()[0], vec![Value::text("Open"), Value::Decimal(150.0), Value::text("Open")]);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn writes_are_refused() {
        let (_dir, wh) = loaded();
        let err = wh.query("purge", "DELETE FROM procurement.orders").unwrap_err();
        assert!(matches!(err, LoadError::WriteQuery { .. }));
        assert_eq!(wh.count_rows("procurement", "orders").unwrap(), 3);

        let err = wh.query("typo", "SELEC 1").unwrap_err();
        assert!(matches!(err, LoadError::Query { ref name, .. } if name == "typo"));
    }

    #[test]
    fn empty_warehouse_has_no_schemas() {
        let dir = tempfile::tempdir().unwrap();
        let wh = Warehouse::new(dir.path().join("absent"));
        assert!(wh.schemas().unwrap().is_empty());
        assert_eq!(wh.query("one", "SELECT 1 AS n").unwrap().rows()[0], vec![Value::Int(1)]);
    }
}
