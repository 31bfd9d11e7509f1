//! Shared types, error model, configuration, and source catalogue for Underwrite.
//!
//! This crate is the foundation depended on by all other Underwrite crates.
//! It provides:
//! - [`UnderwriteError`], the unified error type
//! - Domain types ([`SignalRecord`], [`PropertyType`], [`SignalField`])
//! - The fixed catalogues ([`REGION_CODES`], [`Catalogue`], [`SourceDescriptor`])
//! - The outbound boundaries ([`RowSource`], [`Generator`]) and query types
//! - Configuration ([`AppConfig`], config loading)

pub mod catalogue;
pub mod config;
pub mod error;
pub mod source;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use catalogue::{
    Catalogue, DEFAULT_DATASET, FLOOR_AREA_LOWER_RATIO, FLOOR_AREA_UPPER_RATIO, FilterSpec,
    Predicate, REGION_CODES, SourceDescriptor,
};
pub use config::{
    AggregationConfig, AppConfig, BigQueryConfig, GeminiConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, read_secret_env,
};
pub use error::{Result, UnderwriteError};
pub use source::{Generator, ParamValue, QueryParam, Row, RowSource, SourceQuery};
pub use types::{PropertyType, SignalField, SignalRecord};
