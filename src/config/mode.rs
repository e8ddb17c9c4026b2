//! Build mode selection

use std::fmt;

/// Environment variable consulted for the build mode.
pub const MODE_ENV: &str = "NODE_ENV";

/// Whether outputs are built for local development or for shipping.
///
/// Development keeps readable output with source maps; production minifies,
/// strips unused selectors and omits source maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    /// Derive the mode from the value of `NODE_ENV`.
    ///
    /// Unset, empty or `development` selects development; any other value
    /// selects production.
    pub fn from_node_env(value: Option<&str>) -> Self {
        match value {
            None | Some("") | Some("development") => BuildMode::Development,
            Some(_) => BuildMode::Production,
        }
    }

    /// Read `NODE_ENV` from the process environment.
    pub fn from_env() -> Self {
        let value = std::env::var(MODE_ENV).ok();
        Self::from_node_env(value.as_deref())
    }

    pub fn is_production(&self) -> bool {
        matches!(self, BuildMode::Production)
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Development => write!(f, "development"),
            BuildMode::Production => write!(f, "production"),
        }
    }
}
