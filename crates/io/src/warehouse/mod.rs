//! Idempotent append-only loads into a SQLite-backed warehouse.
//!
//! Every load creates the target schema and table when absent and inserts
//! only rows whose primary key is new. Existing rows are never updated and
//! existing tables are never altered. Queries run read-only across every
//! schema.

pub mod identifier;
mod loader;
mod query;
pub mod sanitize;
pub mod sql;

pub use identifier::normalize_identifier;
pub use loader::{LoadReport, Warehouse};
