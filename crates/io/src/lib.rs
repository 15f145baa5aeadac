// File I/O: spreadsheet import, classification, cycle grouping, warehouse loads

pub mod csv;
pub mod error;
pub mod grouping;
pub mod registry;
pub mod sheet;
pub mod warehouse;
pub mod xlsx;

pub use error::{IoError, LoadError};
pub use grouping::{complete_groups, CycleGroup, GroupingOptions};
pub use registry::{Classification, ClassifiedTable, KindSpec, SchemaRegistry, DEFAULT_HEADER_SCAN};
pub use warehouse::{LoadReport, Warehouse};
