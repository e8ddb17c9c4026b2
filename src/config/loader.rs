//! Configuration loading and discovery for `sluice.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::SluiceConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "sluice.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse sluice.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override dev server port
    pub port: Option<u16>,
    /// Disable the public tunnel
    pub no_tunnel: bool,
}

/// Find sluice.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find sluice.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a sluice.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns the default
/// configuration, which describes the conventional `src/` → `dist/` layout.
///
/// Returns the config together with the project root (the directory holding
/// the file, or the current directory when none was found).
pub fn load_config(path: Option<&Path>) -> Result<(SluiceConfig, PathBuf), ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => {
            let config = load_config_file(&p)?;
            let root = p
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            Ok((config, root))
        }
        None => {
            let root = env::current_dir()?;
            Ok((SluiceConfig::default(), root))
        }
    }
}

/// Load configuration from a specific file path.
pub fn load_config_file(path: &Path) -> Result<SluiceConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration text.
pub fn parse_config(contents: &str) -> Result<SluiceConfig, ConfigError> {
    let config: SluiceConfig = toml::from_str(contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Merge CLI overrides into a loaded configuration.
pub fn merge_cli_overrides(config: &mut SluiceConfig, overrides: &CliOverrides) {
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    if overrides.no_tunnel {
        config.server.tunnel = None;
    }
}
