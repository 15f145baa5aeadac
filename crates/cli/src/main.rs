// procledger CLI - order/delivery reconciliation and warehouse loads

mod exit_codes;
mod inspect;
mod load;
mod pipeline;
mod reconcile;
mod util;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use procledger_config::{ConfigError, Settings};
use procledger_io::{IoError, LoadError, DEFAULT_HEADER_SCAN};
use procledger_recon::lookup::LookupSpec;
use procledger_recon::ReconError;
use tracing_subscriber::EnvFilter;

use exit_codes::{io_exit_code, load_exit_code, recon_exit_code, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "procledger")]
#[command(about = "Reconcile purchase orders against deliveries, price late-delivery penalties, load the ledger")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/procledger/config.toml)
    #[arg(long, global = true, env = "PROCLEDGER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the penalty ledger from an orders and a deliveries export
    #[command(after_help = "\
Examples:
  procledger reconcile orders.csv deliveries.csv
  procledger reconcile orders.xlsx deliveries.xlsx --today 2025-01-20 --out ledger.csv
  procledger reconcile orders.csv deliveries.csv --json")]
    Reconcile {
        /// Orders export (CSV or Excel, header on the first row)
        orders: PathBuf,

        /// Deliveries export (CSV or Excel, header on the first row)
        deliveries: PathBuf,

        /// Reference date for open orders, YYYY-MM-DD (default: today)
        #[arg(long, value_parser = parse_date_arg)]
        today: Option<NaiveDate>,

        /// Write the ledger as CSV
        #[arg(long)]
        out: Option<PathBuf>,

        /// Print the ledger as JSON instead of a summary
        #[arg(long)]
        json: bool,

        /// Fail when ledger totals do not match the inputs
        #[arg(long)]
        strict: bool,
    },

    /// Idempotently append a table to the warehouse
    #[command(after_help = "\
Examples:
  procledger load ledger.csv --schema procurement --table ledger --key order_id,delivery_key
  procledger load altas.xlsx --schema staging --table deliveries --key delivery_id --json")]
    Load {
        /// Table to load (CSV or Excel, header on the first row). Text columns
        /// are typed by content before loading.
        file: PathBuf,

        #[arg(long)]
        schema: String,

        #[arg(long)]
        table: String,

        /// Primary key columns; rows with an empty key cell are skipped
        #[arg(long, required = true, num_args = 1.., value_delimiter = ',')]
        key: Vec<String>,

        /// Warehouse directory (default: warehouse.root from config)
        #[arg(long)]
        root: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Group a data directory into cycles, reconcile each complete cycle and load its ledger
    #[command(after_help = "\
Examples:
  procledger run /data/exports
  procledger run /data/exports --dry-run --json")]
    Run {
        /// Directory holding one subdirectory per export category
        data_dir: PathBuf,

        /// Reference date for open orders, YYYY-MM-DD (default: today)
        #[arg(long, value_parser = parse_date_arg)]
        today: Option<NaiveDate>,

        /// Reconcile but do not load
        #[arg(long)]
        dry_run: bool,

        /// Warehouse directory (default: warehouse.root from config)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Fail on the first cycle whose ledger totals do not match its inputs
        #[arg(long)]
        strict: bool,

        #[arg(long)]
        json: bool,
    },

    /// Report which table kind a file's header matches
    Classify {
        file: PathBuf,

        /// Rows searched for the header
        #[arg(long, default_value_t = DEFAULT_HEADER_SCAN)]
        max_scan: usize,

        #[arg(long)]
        json: bool,
    },

    /// Copy columns from a reference table onto another by key
    #[command(after_help = "\
Examples:
  procledger enrich deliveries.csv invoices.csv --left-key delivery_id --right-key delivery --return uuid --out enriched.csv")]
    Enrich {
        /// Table to enrich
        left: PathBuf,

        /// Reference table
        right: PathBuf,

        #[arg(long, required = true, num_args = 1.., value_delimiter = ',')]
        left_key: Vec<String>,

        #[arg(long, required = true, num_args = 1.., value_delimiter = ',')]
        right_key: Vec<String>,

        /// Columns copied from the reference table
        #[arg(long = "return", required = true, num_args = 1.., value_delimiter = ',')]
        returns: Vec<String>,

        /// Text for rows without a match
        #[arg(long, default_value = procledger_recon::lookup::DEFAULT_FILL)]
        fill: String,

        /// Write the enriched table as CSV
        #[arg(long)]
        out: PathBuf,
    },

    /// Compare amounts per status between two cycles
    #[command(after_help = "\
Examples:
  procledger compare ledger.csv --previous 2025-01-13-08 --current 2025-01-20-08
  procledger compare --from-warehouse --json
  procledger compare ledger.csv --amount-column amount_before_tax --once-per order_id")]
    Compare {
        /// Table holding both cycles (omit with --from-warehouse)
        #[arg(required_unless_present = "from_warehouse")]
        table: Option<PathBuf>,

        /// Read the ledger table from the warehouse instead of a file
        #[arg(long, conflicts_with = "table")]
        from_warehouse: bool,

        /// Earlier cycle label (default: second most recent)
        #[arg(long)]
        previous: Option<String>,

        /// Later cycle label (default: most recent)
        #[arg(long)]
        current: Option<String>,

        #[arg(long, default_value = "status")]
        status_column: String,

        #[arg(long, default_value = "received_amount")]
        amount_column: String,

        #[arg(long, default_value = "cycle_ts")]
        cycle_column: String,

        /// Sum each value of this column once per cycle (for order-level amounts)
        #[arg(long, value_name = "COLUMN")]
        once_per: Option<String>,

        /// Write the comparison as CSV
        #[arg(long)]
        out: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Run read-only SQL files against the warehouse
    #[command(after_help = "\
Examples:
  procledger query reports/late_by_contract.sql
  procledger query reports/ --out-dir out/ --json

Tables are addressed as schema.table, e.g. procurement.ledger.")]
    Query {
        /// SQL files, or directories whose *.sql files run in name order
        #[arg(required = true, num_args = 1..)]
        paths: Vec<PathBuf>,

        /// Warehouse directory (default: warehouse.root from config)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Write each result as <query>.csv into this directory
        #[arg(long)]
        out_dir: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

/// Logs go to stderr; stdout carries command output only.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let result = Settings::load(cli.config.as_deref())
        .map_err(CliError::from)
        .and_then(|settings| run_command(cli.command, &settings));

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn run_command(command: Commands, settings: &Settings) -> Result<(), CliError> {
    match command {
        Commands::Reconcile {
            orders,
            deliveries,
            today,
            out,
            json,
            strict,
        } => reconcile::cmd_reconcile(settings, orders, deliveries, today, out, json, strict),
        Commands::Load {
            file,
            schema,
            table,
            key,
            root,
            json,
        } => load::cmd_load(settings, file, schema, table, key, root, json),
        Commands::Run {
            data_dir,
            today,
            dry_run,
            root,
            strict,
            json,
        } => pipeline::cmd_run(settings, data_dir, today, dry_run, root, strict, json),
        Commands::Classify { file, max_scan, json } => inspect::cmd_classify(settings, file, max_scan, json),
        Commands::Enrich {
            left,
            right,
            left_key,
            right_key,
            returns,
            fill,
            out,
        } => {
            let mut spec = LookupSpec::new(left_key, right_key, returns);
            spec.fill = fill;
            inspect::cmd_enrich(left, right, &spec, out)
        }
        Commands::Compare {
            table,
            from_warehouse,
            previous,
            current,
            status_column,
            amount_column,
            cycle_column,
            once_per,
            out,
            json,
        } => inspect::cmd_compare(
            settings,
            inspect::CompareArgs {
                table,
                from_warehouse,
                previous,
                current,
                status_column,
                amount_column,
                cycle_column,
                once_per,
                out,
                json,
            },
        ),
        Commands::Query {
            paths,
            root,
            out_dir,
            json,
        } => inspect::cmd_query(settings, &paths, root, out_dir, json),
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            hint: None,
        }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<IoError> for CliError {
    fn from(err: IoError) -> Self {
        let hint = match &err {
            IoError::Unclassified { .. } => {
                Some("run `procledger classify <file>` and compare its header with the configured kinds".to_string())
            }
            IoError::UnsupportedFormat(_) => Some("supported: .csv .tsv .txt .xlsx .xlsm .xls .xlsb .ods".to_string()),
            _ => None,
        };
        Self {
            code: io_exit_code(&err),
            message: err.to_string(),
            hint,
        }
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        Self::new(recon_exit_code(&err), err.to_string())
    }
}

impl From<LoadError> for CliError {
    fn from(err: LoadError) -> Self {
        let hint = match &err {
            LoadError::ColumnMismatch { .. } => {
                Some("existing tables are never altered; load into a new table or drop the extra columns".to_string())
            }
            _ => None,
        };
        Self {
            code: load_exit_code(&err),
            message: err.to_string(),
            hint,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::args(err.to_string()).with_hint(format!(
            "default config location: {}",
            Settings::config_path().display()
        ))
    }
}
