//! Shared types, error model, and configuration for fleetsql.
//!
//! This crate is the foundation depended on by all other fleetsql crates.
//! It provides:
//! - [`FleetSqlError`]: the unified error type
//! - Domain types ([`Location`], [`PackageStats`], [`BuildSummary`])
//! - Configuration ([`AppConfig`], [`BuildConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BuildConfig, EcsConfig, ServerConfig, StoreConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{FleetSqlError, Result};
pub use types::{BuildSummary, Location, PackageStats};
