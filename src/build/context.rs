//! Build context shared by every task.

use crate::build::discovery::{DiscoveryError, SourceSet};
use crate::config::{BuildMode, Category, SluiceConfig};
use crate::notifier::{Notifier, TerminalNotifier};
use crate::reload::{ReloadEvent, ReloadHub};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration, mode and channels for a task run.
///
/// Cheap to clone; tasks running on worker threads each hold a copy. The
/// build mode is fixed at construction and never re-read from the
/// environment.
#[derive(Debug, Clone)]
pub struct BuildContext {
    config: Arc<SluiceConfig>,
    /// Project root directory (where sluice.toml is located)
    project_root: PathBuf,
    mode: BuildMode,
    verbose: bool,
    reload: ReloadHub,
    notifier: Arc<dyn Notifier>,
}

impl BuildContext {
    /// Create a new build context.
    pub fn new(config: SluiceConfig, project_root: PathBuf, mode: BuildMode) -> Self {
        Self {
            config: Arc::new(config),
            project_root,
            mode,
            verbose: false,
            reload: ReloadHub::new(),
            notifier: Arc::new(TerminalNotifier::default()),
        }
    }

    pub fn config(&self) -> &SluiceConfig {
        &self.config
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    pub fn is_production(&self) -> bool {
        self.mode.is_production()
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn reload(&self) -> &ReloadHub {
        &self.reload
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Replace the error notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Resolve a path relative to the project root.
    ///
    /// If the path is absolute, returns it unchanged.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Compiled source selector for a category.
    pub fn sources(&self, category: Category) -> Result<SourceSet, DiscoveryError> {
        SourceSet::new(&self.project_root, self.config.paths.sources(category))
    }

    /// Compiled watch selector for a category.
    pub fn watch_set(&self, category: Category) -> Result<SourceSet, DiscoveryError> {
        SourceSet::new(&self.project_root, self.config.paths.watch_globs(category))
    }

    /// Resolved destination directory for a category.
    ///
    /// Sprites have two destinations; this returns the image directory.
    pub fn dest(&self, category: Category) -> PathBuf {
        let paths = &self.config.paths;
        let dest = match category {
            Category::Html => &paths.html.dest,
            Category::Style => &paths.style.dest,
            Category::Js => &paths.js.dest,
            Category::Img => &paths.img.dest,
            Category::Sprite => &paths.sprite.image_dest,
            Category::Fonts => &paths.fonts.dest,
        };
        self.resolve_path(dest)
    }

    /// Directory served by the dev server.
    pub fn serve_root(&self) -> PathBuf {
        self.resolve_path(&self.config.server.base_dir)
    }

    /// URL path of an output file under the served root, with `/` separators.
    pub fn url_path(&self, output: &Path) -> Option<String> {
        let relative = output.strip_prefix(self.serve_root()).ok()?;
        let parts: Vec<_> = relative.components().map(|c| c.as_os_str().to_string_lossy()).collect();
        Some(format!("/{}", parts.join("/")))
    }

    /// Ask browsers to reload the page after `outputs` were written.
    pub fn reload_page(&self, outputs: &[PathBuf]) {
        if outputs.is_empty() {
            return;
        }
        let path = if outputs.len() == 1 { self.url_path(&outputs[0]) } else { None };
        self.reload.notify(ReloadEvent::full(path));
    }
}
