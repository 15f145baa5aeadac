//! `procledger-core`: typed cells, in-memory tables and the type normalizer.
//!
//! Shared by the reconciliation engine and the warehouse loader. No IO.

pub mod error;
pub mod normalize;
pub mod table;
pub mod value;

pub use error::TableError;
pub use normalize::{infer_types, normalize, ColumnRule, NormalizeRule};
pub use table::Table;
pub use value::{is_missing_marker, ColumnType, Value};
