//! `build:js`: bundle the script entry and its imports into one file.
//!
//! A single [`ScriptBundler`] lives for the whole process. It keeps the
//! rolldown bundler (and its module cache) between builds, serialises
//! rebuilds behind an async mutex, and watches the files of the last bundle
//! itself, announcing changes on a broadcast channel.

use crate::build::{format_duration, BuildContext, TaskError};
use crate::config::Category;
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use parking_lot::{Mutex, RwLock};
use rolldown::{BundlerBuilder, BundlerOptions, InputItem, OutputFormat, Platform, RawMinifyOptions, SourceMapType};
use rolldown_common::Output;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

struct BundleState {
    bundler: rolldown::Bundler,
    entry: PathBuf,
}

struct ClosureWatcher {
    debouncer: Debouncer<RecommendedWatcher>,
    dirs: BTreeSet<PathBuf>,
}

/// Long-lived incremental bundler for the script entry point.
pub struct ScriptBundler {
    ctx: BuildContext,
    state: tokio::sync::Mutex<Option<BundleState>>,
    /// Local source files of the last successful bundle
    modules: Arc<RwLock<BTreeSet<PathBuf>>>,
    updates: broadcast::Sender<PathBuf>,
    watcher: Mutex<Option<ClosureWatcher>>,
}

impl std::fmt::Debug for ScriptBundler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptBundler").field("modules", &self.modules.read().len()).finish()
    }
}

impl ScriptBundler {
    pub fn new(ctx: BuildContext) -> Self {
        let (updates, _) = broadcast::channel(16);
        Self {
            ctx,
            state: tokio::sync::Mutex::new(None),
            modules: Arc::new(RwLock::new(BTreeSet::new())),
            updates,
            watcher: Mutex::new(None),
        }
    }

    /// Receive the path of each bundled file that changes on disk.
    pub fn subscribe(&self) -> broadcast::Receiver<PathBuf> {
        self.updates.subscribe()
    }

    /// Source files that made up the last bundle.
    pub fn modules(&self) -> Vec<PathBuf> {
        self.modules.read().iter().cloned().collect()
    }

    /// Bundle and write. Concurrent calls queue on the bundler lock.
    ///
    /// A project without a matching entry point produces no output.
    pub async fn rebuild(&self) -> Result<Vec<PathBuf>, TaskError> {
        let mut guard = self.state.lock().await;
        if guard.is_none() {
            let Some(entry) = self.ctx.sources(Category::Js)?.files()?.into_iter().next() else {
                tracing::warn!("build:js: no entry matches {:?}", self.ctx.config().paths.js.src);
                return Ok(vec![]);
            };
            *guard = Some(BundleState::new(&self.ctx, entry.path)?);
        }
        let Some(state) = guard.as_mut() else {
            return Ok(vec![]);
        };

        tracing::debug!("bundling {}", state.entry.display());
        let start = Instant::now();
        let bundle = state.bundler.generate().await.map_err(|e| TaskError::Script(format!("{:?}", e)))?;

        let dest = self.ctx.dest(Category::Js);
        let bundle_name = &self.ctx.config().script.bundle_name;
        let mut outputs = Vec::new();
        let mut modules = BTreeSet::new();
        let mut bytes = 0;

        for item in &bundle.assets {
            let (target, data): (PathBuf, &[u8]) = match item {
                Output::Chunk(chunk) => {
                    modules.extend(
                        chunk.module_ids.iter().map(|id| id.to_string()).filter(|id| is_local_module(id)).map(PathBuf::from),
                    );
                    let name = if chunk.is_entry { bundle_name.as_str() } else { chunk.filename.as_str() };
                    (dest.join(name), chunk.code.as_bytes())
                }
                Output::Asset(asset) => (dest.join(asset.filename.as_str()), asset.source.as_bytes()),
            };
            super::write_output(&target, data)?;
            bytes += data.len();
            outputs.push(target);
        }
        drop(guard);

        tracing::info!(
            "{} bytes written to {} ({})",
            bytes,
            dest.display(),
            format_duration(start.elapsed())
        );

        *self.modules.write() = modules.iter().map(|m| canonical(m)).collect();
        self.sync_watch_dirs();
        self.ctx.reload_page(&outputs);
        Ok(outputs)
    }

    /// Start watching the directories of the bundled files.
    ///
    /// Changes are published to [`subscribe`](Self::subscribe) receivers; the
    /// watched set follows the module list after every rebuild.
    pub fn watch(&self) -> Result<(), TaskError> {
        {
            let mut slot = self.watcher.lock();
            if slot.is_none() {
                let modules = Arc::clone(&self.modules);
                let tx = self.updates.clone();
                let debounce = Duration::from_millis(u64::from(self.ctx.config().watch.debounce_ms));
                let debouncer = new_debouncer(debounce, move |res: DebounceEventResult| match res {
                    Ok(events) => {
                        for event in events {
                            let path = canonical(&event.path);
                            if modules.read().contains(&path) {
                                let _ = tx.send(path);
                            }
                        }
                    }
                    Err(e) => tracing::warn!("script watcher error: {}", e),
                })?;
                *slot = Some(ClosureWatcher { debouncer, dirs: BTreeSet::new() });
            }
        }
        self.sync_watch_dirs();
        Ok(())
    }

    fn sync_watch_dirs(&self) {
        let mut slot = self.watcher.lock();
        let Some(watcher) = slot.as_mut() else {
            return;
        };
        let wanted: BTreeSet<PathBuf> =
            self.modules.read().iter().filter_map(|m| m.parent().map(Path::to_path_buf)).collect();

        for dir in wanted.difference(&watcher.dirs.clone()) {
            match watcher.debouncer.watcher().watch(dir, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    watcher.dirs.insert(dir.clone());
                }
                Err(e) => tracing::warn!("cannot watch {}: {}", dir.display(), e),
            }
        }
    }
}

impl BundleState {
    fn new(ctx: &BuildContext, entry: PathBuf) -> Result<Self, TaskError> {
        let production = ctx.is_production();
        let name = Path::new(&ctx.config().script.bundle_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "index".to_string());

        let options = BundlerOptions {
            input: Some(vec![InputItem { name: Some(name), import: entry.to_string_lossy().into_owned() }]),
            cwd: Some(ctx.project_root().to_path_buf()),
            format: Some(OutputFormat::Iife),
            platform: Some(Platform::Browser),
            sourcemap: (!production).then_some(SourceMapType::Inline),
            minify: production.then(|| RawMinifyOptions::from(true)),
            ..Default::default()
        };

        let bundler = BundlerBuilder::default()
            .with_options(options)
            .build()
            .map_err(|e| TaskError::Script(format!("{:?}", e)))?;
        tracing::debug!("script bundler ready for {}", entry.display());
        Ok(Self { bundler, entry })
    }
}

/// Real files of the project; skips virtual and dependency modules.
fn is_local_module(id: &str) -> bool {
    !id.starts_with('\0')
        && !id.contains("node_modules")
        && Path::new(id).is_absolute()
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
