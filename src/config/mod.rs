//! Configuration for the sluice build pipeline
//!
//! Provides types and parsing for `sluice.toml` project configuration.

pub mod loader;
pub mod mode;
pub mod schema;

pub use loader::{load_config, merge_cli_overrides, CliOverrides, ConfigError, CONFIG_FILE};
pub use mode::BuildMode;
pub use schema::*;
