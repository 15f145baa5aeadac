use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    /// A required column is absent from the named input table.
    #[error("{table}: missing required column '{column}'")]
    MissingColumn { table: String, column: String },
    /// A row does not have one cell per column.
    #[error("row {row}: expected {expected} cells, found {found}")]
    RowWidth { row: usize, expected: usize, found: usize },
    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
}
