//! `build:img`: optimise changed images into the output directory.

use crate::build::{BuildContext, SourceFile, TaskError};
use crate::config::{Category, ImagesConfig};
use crate::optimize::{optimize, ImageKind};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

pub fn run(ctx: &BuildContext) -> Result<Vec<PathBuf>, TaskError> {
    let files = ctx.sources(Category::Img)?.files()?;
    let dest = ctx.dest(Category::Img);
    let config = &ctx.config().images;

    let written: Vec<Option<PathBuf>> =
        files.par_iter().map(|file| process(file, &dest, config)).collect::<Result<_, _>>()?;
    let outputs: Vec<PathBuf> = written.into_iter().flatten().collect();

    ctx.reload_page(&outputs);
    Ok(outputs)
}

fn process(file: &SourceFile, dest: &Path, config: &ImagesConfig) -> Result<Option<PathBuf>, TaskError> {
    let target = dest.join(&file.relative);
    if is_up_to_date(&file.path, &target) {
        return Ok(None);
    }

    let data = fs::read(&file.path).map_err(TaskError::io(&file.path))?;
    let kind = ImageKind::from_path(&file.path);
    let bytes = optimize(kind, &data, config).map_err(|e| TaskError::image(&file.path, e))?;
    super::write_output(&target, &bytes)?;

    let saved = data.len().saturating_sub(bytes.len());
    tracing::info!("build:img {} (saved {} B)", file.path.display(), saved);
    Ok(Some(target))
}

/// The destination exists and is at least as new as the source.
fn is_up_to_date(src: &Path, dest: &Path) -> bool {
    let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(src), modified(dest)) {
        (Some(src), Some(dest)) => dest >= src,
        _ => false,
    }
}
