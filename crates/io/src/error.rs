use std::path::PathBuf;

use procledger_core::TableError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: malformed CSV: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{}: {message}", path.display())]
    Excel { path: PathBuf, message: String },
    #[error("{}: unsupported file type", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("{}: no rows", .0.display())]
    Empty(PathBuf),
    #[error("{}: no header row matches a known kind in the first {scanned} rows", path.display())]
    Unclassified { path: PathBuf, scanned: usize },
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Warehouse failures. Load variants name the target `schema.table`, query
/// variants the query.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{schema}.{table}: residual missing-value markers after sanitization in column(s): {}", columns.join(", "))]
    ResidualMissingMarker {
        schema: String,
        table: String,
        columns: Vec<String>,
    },
    #[error("{schema}.{table}: column(s) not present in the existing table: {}", columns.join(", "))]
    ColumnMismatch {
        schema: String,
        table: String,
        columns: Vec<String>,
    },
    #[error("{schema}.{table}: key column '{column}' is not in the input")]
    MissingKeyColumn {
        schema: String,
        table: String,
        column: String,
    },
    #[error("{schema}.{table}: no primary key columns given")]
    NoPrimaryKey { schema: String, table: String },
    #[error("{schema}.{table}: invalid identifier '{name}'")]
    InvalidIdentifier {
        schema: String,
        table: String,
        name: String,
    },
    #[error("{schema}.{table}: {context}: {source}")]
    Storage {
        schema: String,
        table: String,
        context: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("query '{name}': {message}")]
    Query { name: String, message: String },
    #[error("query '{name}' would modify the warehouse; only read-only statements run")]
    WriteQuery { name: String },
    #[error("cannot create warehouse directory {}: {source}", path.display())]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
