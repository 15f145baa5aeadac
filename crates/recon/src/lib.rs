//! `procledger-recon`: order/delivery reconciliation and penalty engine.
//!
//! Pure engine crate: receives tables, returns a priced ledger.
//! No CLI or storage dependencies.

pub mod columns;
pub mod compare;
pub mod config;
pub mod engine;
pub mod error;
pub mod join;
pub mod lookup;
pub mod model;
pub mod penalty;
pub mod validate;

pub use config::{PenaltyPolicy, ReconOptions};
pub use engine::{reconcile, reconcile_to_table};
pub use error::ReconError;
pub use model::{Ledger, LedgerLine, LineSource, LEDGER_COLUMNS};
pub use validate::{check_conservation, ConservationReport};
