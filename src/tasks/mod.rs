//! Task bodies.
//!
//! Each leaf task reads its sources through the [`BuildContext`], writes
//! outputs and returns the paths it wrote. Synchronous bodies are run on the
//! blocking pool by the [`TaskRunner`](crate::build::TaskRunner).

pub mod clean;
pub mod fonts;
pub mod images;
pub mod markup;
pub mod script;
pub mod sprite;
pub mod style;

use crate::build::{SourceFile, TaskError};
use std::fs;
use std::path::{Path, PathBuf};

/// Write `bytes` to `path`, creating parent directories.
pub(crate) fn write_output(path: &Path, bytes: &[u8]) -> Result<(), TaskError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(TaskError::io(parent))?;
        }
    }
    fs::write(path, bytes).map_err(TaskError::io(path))
}

/// Copy each source into `dest`, preserving its path below the glob base.
pub(crate) fn copy_sources(files: &[SourceFile], dest: &Path) -> Result<Vec<PathBuf>, TaskError> {
    let mut outputs = Vec::with_capacity(files.len());
    for file in files {
        let target = dest.join(&file.relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(TaskError::io(parent))?;
        }
        fs::copy(&file.path, &target).map_err(TaskError::io(&file.path))?;
        outputs.push(target);
    }
    Ok(outputs)
}
