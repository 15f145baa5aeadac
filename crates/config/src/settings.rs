// Pipeline settings
// Loaded from ~/.config/procledger/config.toml

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use procledger_core::{ColumnRule, NormalizeRule};
use procledger_io::grouping::MAX_WINDOW_HOURS;
use procledger_io::{GroupingOptions, KindSpec};
use procledger_recon::config::DEFAULT_DATE_FORMAT;
use procledger_recon::PenaltyPolicy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateSettings {
    /// chrono format for text dates in source exports
    pub format: String,
}

impl Default for DateSettings {
    fn default() -> Self {
        Self {
            format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseSettings {
    /// Directory holding one SQLite file per schema
    pub root: PathBuf,
    pub schema: String,
    pub ledger_table: String,
    pub ledger_key: Vec<String>,
}

impl Default for WarehouseSettings {
    fn default() -> Self {
        Self {
            root: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("procledger")
                .join("warehouse"),
            schema: "procurement".to_string(),
            ledger_table: "ledger".to_string(),
            ledger_key: vec![
                "order_id".to_string(),
                "delivery_key".to_string(),
                "cycle_ts".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub penalty: PenaltyPolicy,
    pub dates: DateSettings,
    pub grouping: GroupingOptions,
    pub warehouse: WarehouseSettings,
    /// Registry entries; empty means the canonical-header kinds.
    pub kinds: Vec<KindSpec>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            penalty: PenaltyPolicy::default(),
            dates: DateSettings::default(),
            grouping: GroupingOptions::default(),
            warehouse: WarehouseSettings::default(),
            kinds: Vec::new(),
        }
    }
}

impl Settings {
    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("procledger")
            .join("config.toml")
    }

    /// Load from `path`, or from [`Settings::config_path`] when `None`.
    ///
    /// A missing default file yields defaults. A missing explicit file is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::config_path(), false),
        };
        if !explicit && !path.exists() {
            log::debug!("{}: not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let settings = Self::from_toml(&contents)?;
        log::debug!("loaded config from {}", path.display());
        Ok(settings)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Configured kinds, or [`default_kinds`] using `dates.format`.
    pub fn kinds(&self) -> Vec<KindSpec> {
        if self.kinds.is_empty() {
            default_kinds(&self.dates.format)
        } else {
            self.kinds.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.penalty
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.dates.format.trim().is_empty() {
            return Err(ConfigError::Invalid("dates.format is empty".into()));
        }
        if !(0..=MAX_WINDOW_HOURS).contains(&self.grouping.window_hours) {
            return Err(ConfigError::Invalid(format!(
                "grouping.window_hours must be between 0 and {MAX_WINDOW_HOURS}, got {}",
                self.grouping.window_hours
            )));
        }
        if self.grouping.categories.is_empty() {
            return Err(ConfigError::Invalid("grouping.categories is empty".into()));
        }
        if self.warehouse.ledger_key.is_empty() {
            return Err(ConfigError::Invalid("warehouse.ledger_key is empty".into()));
        }
        if self.warehouse.schema.trim().is_empty() || self.warehouse.ledger_table.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "warehouse.schema and warehouse.ledger_table must be set".into(),
            ));
        }

        let mut names = HashSet::new();
        for kind in &self.kinds {
            if !names.insert(kind.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate kind '{}'", kind.name)));
            }
            if kind.headers.is_empty() {
                return Err(ConfigError::Invalid(format!("kind '{}' has no headers", kind.name)));
            }
        }
        Ok(())
    }
}

/// Kinds for exports that already carry canonical column names.
pub fn default_kinds(date_format: &str) -> Vec<KindSpec> {
    let date = || NormalizeRule::Date {
        format: date_format.to_string(),
    };
    vec![
        KindSpec {
            name: "orders".to_string(),
            headers: [
                "contract_id",
                "order_id",
                "article_code",
                "issue_date",
                "due_date",
                "requested_quantity",
                "unit_price",
                "amount_before_tax",
                "status",
            ]
            .map(String::from)
            .to_vec(),
            renames: Default::default(),
            rules: vec![
                ColumnRule::new("issue_date", date()),
                ColumnRule::new("due_date", date()),
                ColumnRule::new("requested_quantity", NormalizeRule::Decimal),
                ColumnRule::new("unit_price", NormalizeRule::Decimal),
                ColumnRule::new("amount_before_tax", NormalizeRule::Decimal),
                ColumnRule::new("status", NormalizeRule::TrimmedString),
            ],
        },
        KindSpec {
            name: "deliveries".to_string(),
            headers: [
                "delivery_id",
                "order_id_ref",
                "registration_date",
                "received_quantity",
                "received_amount",
            ]
            .map(String::from)
            .to_vec(),
            renames: Default::default(),
            rules: vec![
                ColumnRule::new("registration_date", date()),
                ColumnRule::new("received_quantity", NormalizeRule::Decimal),
                ColumnRule::new("received_amount", NormalizeRule::Decimal),
            ],
        },
    ]
}
