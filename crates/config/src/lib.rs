// Configuration loading

pub mod error;
pub mod settings;

pub use error::ConfigError;
pub use settings::{DateSettings, Settings, WarehouseSettings};
