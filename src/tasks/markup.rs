//! `build:html`: copy pages verbatim.

use crate::build::{BuildContext, TaskError};
use crate::config::Category;
use std::path::PathBuf;

pub fn run(ctx: &BuildContext) -> Result<Vec<PathBuf>, TaskError> {
    let files = ctx.sources(Category::Html)?.files()?;
    let outputs = super::copy_sources(&files, &ctx.dest(Category::Html))?;
    ctx.reload_page(&outputs);
    Ok(outputs)
}
