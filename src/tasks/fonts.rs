//! `build:fonts`: copy font files. No reload is sent.

use crate::build::{BuildContext, TaskError};
use crate::config::Category;
use std::path::PathBuf;

pub fn run(ctx: &BuildContext) -> Result<Vec<PathBuf>, TaskError> {
    let files = ctx.sources(Category::Fonts)?.files()?;
    super::copy_sources(&files, &ctx.dest(Category::Fonts))
}
