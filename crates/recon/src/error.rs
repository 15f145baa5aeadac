use procledger_core::TableError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    /// Required column absent from an input table; carries the table label.
    #[error(transparent)]
    Schema(#[from] TableError),
    /// Penalty policy values out of range.
    #[error("invalid penalty policy: {0}")]
    InvalidPolicy(String),
    /// Lookup spec is malformed (key arity mismatch, no return columns).
    #[error("invalid lookup: {0}")]
    InvalidLookup(String),
}
