//! Task error type.

use crate::atlas::PackError;
use crate::build::discovery::DiscoveryError;
use crate::build::task::{TaskGraphError, TaskName};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error raised by a single task invocation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskError {
    /// Filesystem failure on a specific path
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Source selection failed
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    /// Stylesheet compilation or transformation failed
    #[error("{0}")]
    Style(String),
    /// Script bundling failed
    #[error("{0}")]
    Script(String),
    /// Sprite packing failed
    #[error(transparent)]
    Sprite(#[from] PackError),
    /// Image could not be decoded or re-encoded
    #[error("{}: {message}", path.display())]
    Image { path: PathBuf, message: String },
    /// Dev server failed to start or serve
    #[error("server error: {0}")]
    Server(String),
    /// File watcher failed
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
    /// Blocking worker panicked or was cancelled
    #[error("task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
    /// Task ordering failed
    #[error(transparent)]
    Graph(#[from] TaskGraphError),
    /// A long-running task was scheduled alongside finite ones
    #[error("'{0}' runs until interrupted and cannot be combined with other tasks")]
    NotBatchable(TaskName),
}

impl TaskError {
    /// Adapter for `map_err` that attaches the path being worked on.
    pub fn io(path: impl AsRef<Path>) -> impl FnOnce(std::io::Error) -> TaskError {
        let path = path.as_ref().to_path_buf();
        move |source| TaskError::Io { path, source }
    }

    /// Image error for `path`.
    pub fn image(path: impl AsRef<Path>, message: impl std::fmt::Display) -> TaskError {
        TaskError::Image { path: path.as_ref().to_path_buf(), message: message.to_string() }
    }
}
