//! `clean`: remove the output directory tree.

use crate::build::{BuildContext, TaskError};
use std::fs;
use std::path::PathBuf;

/// Delete the configured clean target. A missing directory is not an error.
///
/// Returns the removed directory, or nothing when there was none.
pub fn run(ctx: &BuildContext) -> Result<Vec<PathBuf>, TaskError> {
    let target = ctx.resolve_path(&ctx.config().paths.clean);
    if target == ctx.project_root() || ctx.project_root().starts_with(&target) {
        return Err(TaskError::Io {
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "refusing to delete the project root",
            ),
            path: target,
        });
    }

    match fs::remove_dir_all(&target) {
        Ok(()) => {
            tracing::info!("Deleted {}", target.display());
            Ok(vec![target])
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(vec![]),
        Err(e) => Err(TaskError::Io { path: target, source: e }),
    }
}
