//! CLI Exit Code Registry
//!
//! Single source of truth for `procledger` exit codes. Scripts that drive
//! nightly loads branch on these, so a code never changes meaning.
//!
//! | Range   | Domain     | Description                                  |
//! |---------|------------|----------------------------------------------|
//! | 0       | Universal  | Success                                      |
//! | 1       | Universal  | General error (unspecified)                  |
//! | 2       | Universal  | Usage error (bad args, bad config)           |
//! | 3-9     | input      | Reading and classifying source exports       |
//! | 10-19   | reconcile  | Ledger construction                          |
//! | 20-29   | warehouse  | Loads into the warehouse                     |

use procledger_io::{IoError, LoadError};
use procledger_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments or an invalid config file.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Input (3-9)
// =============================================================================

/// File missing, unreadable, or malformed.
pub const EXIT_INPUT_READ: u8 = 3;

/// No header row matched a known table kind.
pub const EXIT_INPUT_UNCLASSIFIED: u8 = 4;

/// A required column is missing from an input table.
pub const EXIT_INPUT_SCHEMA: u8 = 5;

/// Data directory holds no complete cycle.
pub const EXIT_INPUT_NO_CYCLES: u8 = 6;

// =============================================================================
// Reconcile (10-19)
// =============================================================================

/// Penalty policy rejected.
pub const EXIT_RECON_POLICY: u8 = 10;

/// Ledger totals do not match the raw inputs (`--strict` only).
pub const EXIT_RECON_NOT_CONSERVED: u8 = 11;

/// Lookup specification rejected.
pub const EXIT_RECON_LOOKUP: u8 = 12;

// =============================================================================
// Warehouse (20-29)
// =============================================================================

/// Storage failure (cannot open, create, or write).
pub const EXIT_LOAD_STORAGE: u8 = 20;

/// Input columns do not fit the existing table.
pub const EXIT_LOAD_COLUMNS: u8 = 21;

/// Missing-value markers survived sanitization.
pub const EXIT_LOAD_RESIDUAL: u8 = 22;

/// Primary key absent or not present in the input.
pub const EXIT_LOAD_KEY: u8 = 23;

/// Warehouse query failed or would write.
pub const EXIT_LOAD_QUERY: u8 = 24;

pub fn io_exit_code(err: &IoError) -> u8 {
    match err {
        IoError::Unclassified { .. } => EXIT_INPUT_UNCLASSIFIED,
        IoError::UnsupportedFormat(_) => EXIT_USAGE,
        IoError::Table(_) => EXIT_INPUT_SCHEMA,
        IoError::Write { .. } => EXIT_ERROR,
        IoError::Read { .. } | IoError::Csv { .. } | IoError::Excel { .. } | IoError::Empty(_) => {
            EXIT_INPUT_READ
        }
    }
}

pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::Schema(_) => EXIT_INPUT_SCHEMA,
        ReconError::InvalidPolicy(_) => EXIT_RECON_POLICY,
        ReconError::InvalidLookup(_) => EXIT_RECON_LOOKUP,
    }
}

pub fn load_exit_code(err: &LoadError) -> u8 {
    match err {
        LoadError::ColumnMismatch { .. } => EXIT_LOAD_COLUMNS,
        LoadError::ResidualMissingMarker { .. } => EXIT_LOAD_RESIDUAL,
        LoadError::MissingKeyColumn { .. } | LoadError::NoPrimaryKey { .. } => EXIT_LOAD_KEY,
        LoadError::Query { .. } | LoadError::WriteQuery { .. } => EXIT_LOAD_QUERY,
        LoadError::InvalidIdentifier { .. } | LoadError::Storage { .. } | LoadError::Root { .. } => {
            EXIT_LOAD_STORAGE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn codes_are_distinct_within_their_range() {
        let input = [EXIT_INPUT_READ, EXIT_INPUT_UNCLASSIFIED, EXIT_INPUT_SCHEMA, EXIT_INPUT_NO_CYCLES];
        let load = [EXIT_LOAD_STORAGE, EXIT_LOAD_COLUMNS, EXIT_LOAD_RESIDUAL, EXIT_LOAD_KEY, EXIT_LOAD_QUERY];
        for set in [&input[..], &load[..]] {
            let mut sorted = set.to_vec();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), set.len());
        }
        assert!(input.iter().all(|c| (3..=9).contains(c)));
        assert!(load.iter().all(|c| (20..=29).contains(c)));
    }

    #[test]
    fn unclassified_maps_to_its_code() {
        let err = IoError::Unclassified {
            path: PathBuf::from("x.csv"),
            scanned: 11,
        };
        assert_eq!(io_exit_code(&err), EXIT_INPUT_UNCLASSIFIED);
        let err = LoadError::NoPrimaryKey {
            schema: "s".into(),
            table: "t".into(),
        };
        assert_eq!(load_exit_code(&err), EXIT_LOAD_KEY);
    }
}
