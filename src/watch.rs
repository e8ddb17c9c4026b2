//! Watch mode for automatic rebuilds on file changes
//!
//! Each watched category owns a [`TaskSlot`]. A change starts the slot's task
//! when idle; changes arriving while it runs queue exactly one rerun. Script
//! changes come from the bundler's own watcher instead of the directory
//! watcher.

use crate::build::{BuildContext, SourceSet, TaskError, TaskName, TaskResult, TaskRunner, TaskStatus};
use crate::config::Category;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    /// Running, and another change arrived meanwhile
    RunningDirty,
}

#[derive(Debug)]
struct SlotState {
    phase: Phase,
    failing: bool,
}

/// Run state of one watched task.
#[derive(Debug)]
pub struct TaskSlot {
    task: TaskName,
    state: Mutex<SlotState>,
}

impl TaskSlot {
    pub fn new(task: TaskName) -> Self {
        Self { task, state: Mutex::new(SlotState { phase: Phase::Idle, failing: false }) }
    }

    pub fn task(&self) -> TaskName {
        self.task
    }

    /// Register a change. Returns `true` when the caller must start a run.
    pub fn request(&self) -> bool {
        let mut state = self.state.lock();
        match state.phase {
            Phase::Idle => {
                state.phase = Phase::Running;
                true
            }
            Phase::Running | Phase::RunningDirty => {
                state.phase = Phase::RunningDirty;
                false
            }
        }
    }

    /// Record the end of a run. Returns `true` when a queued change needs
    /// another run.
    pub fn finish(&self) -> bool {
        let mut state = self.state.lock();
        match state.phase {
            Phase::RunningDirty => {
                state.phase = Phase::Running;
                true
            }
            Phase::Running | Phase::Idle => {
                state.phase = Phase::Idle;
                false
            }
        }
    }

    /// Remember whether the last run failed; returns `true` if it had been
    /// failing before and now succeeded.
    fn record(&self, success: bool) -> bool {
        let mut state = self.state.lock();
        let fixed = state.failing && success;
        state.failing = !success;
        fixed
    }

    pub fn is_idle(&self) -> bool {
        self.state.lock().phase == Phase::Idle
    }
}

/// Watched categories and the tasks they trigger.
#[derive(Debug)]
pub struct WatchTable {
    entries: Vec<(SourceSet, Arc<TaskSlot>)>,
}

impl WatchTable {
    pub fn new(ctx: &BuildContext) -> Result<Self, TaskError> {
        let mut entries = Vec::new();
        for (category, task) in [
            (Category::Html, TaskName::Html),
            (Category::Style, TaskName::Sass),
            (Category::Img, TaskName::Img),
            (Category::Fonts, TaskName::Fonts),
        ] {
            entries.push((ctx.watch_set(category)?, Arc::new(TaskSlot::new(task))));
        }
        Ok(Self { entries })
    }

    /// Slots whose watch globs select `path`.
    pub fn slots_for(&self, path: &Path) -> Vec<Arc<TaskSlot>> {
        self.entries.iter().filter(|(set, _)| set.matches(path)).map(|(_, slot)| Arc::clone(slot)).collect()
    }

    /// Outermost directories to watch recursively.
    pub fn roots(&self) -> Vec<PathBuf> {
        let bases: BTreeSet<PathBuf> = self.entries.iter().flat_map(|(set, _)| set.bases()).collect();
        let mut roots: Vec<PathBuf> = Vec::new();
        for base in bases {
            if !roots.iter().any(|r| base.starts_with(r)) {
                roots.push(base);
            }
        }
        roots
    }
}

/// Start `slot`'s task unless it is already running.
fn trigger(slot: &Arc<TaskSlot>, runner: &TaskRunner) {
    if !slot.request() {
        return;
    }
    let slot = Arc::clone(slot);
    let runner = runner.clone();
    tokio::spawn(async move {
        loop {
            match runner.run_tasks(&[slot.task()]).await {
                Ok(result) => {
                    let success = result.is_success();
                    if slot.record(success) {
                        println!("[{}] Fixed: {}", timestamp(), slot.task());
                    }
                    for task in &result.tasks {
                        print_task_result(task);
                    }
                }
                Err(e) => eprintln!("[{}] Error: {}", timestamp(), e),
            }
            if !slot.finish() {
                break;
            }
        }
    });
}

/// Watch sources until `shutdown` resolves.
pub async fn run<S>(runner: TaskRunner, shutdown: S) -> Result<(), TaskError>
where
    S: Future<Output = ()>,
{
    let ctx = runner.context().clone();
    let table = WatchTable::new(&ctx)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let debounce = Duration::from_millis(u64::from(ctx.config().watch.debounce_ms));
    let mut debouncer = new_debouncer(debounce, move |res: DebounceEventResult| {
        let _ = tx.send(res);
    })?;

    for root in table.roots() {
        if root.is_dir() {
            debouncer.watcher().watch(&root, RecursiveMode::Recursive)?;
        } else {
            tracing::warn!("not watching {}: directory does not exist", root.display());
        }
    }

    let script = Arc::clone(runner.script());
    let js = Arc::new(TaskSlot::new(TaskName::Js));
    let mut js_updates = script.subscribe();
    script.watch()?;
    if script.modules().is_empty() {
        trigger(&js, &runner);
    }

    println!("[{}] Watching {} for changes...", timestamp(), ctx.project_root().display());

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(res) = rx.recv() => match res {
                Ok(events) => {
                    let mut started = BTreeSet::new();
                    for event in &events {
                        for slot in table.slots_for(&event.path) {
                            if started.insert(slot.task()) {
                                println!("[{}] Changed: {}", timestamp(), display_name(&event.path));
                                trigger(&slot, &runner);
                            }
                        }
                    }
                }
                // Watch error (non-fatal) - log but continue watching
                Err(error) => eprintln!("[{}] Watch error: {:?}", timestamp(), error),
            },
            update = js_updates.recv() => match update {
                Ok(path) => {
                    println!("[{}] Changed: {}", timestamp(), display_name(&path));
                    trigger(&js, &runner);
                }
                Err(RecvError::Lagged(_)) => trigger(&js, &runner),
                Err(RecvError::Closed) => break,
            },
        }
    }

    drop(debouncer);
    println!("[{}] Stopped watching", timestamp());
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| path.display().to_string())
}

/// Get current timestamp for logging
fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

fn print_task_result(result: &TaskResult) {
    match &result.status {
        TaskStatus::Failed(error) => {
            eprintln!("[{}] {} failed: {}", timestamp(), result.task, error);
        }
        TaskStatus::Success | TaskStatus::Skipped => {
            println!(
                "[{}] {} done ({}) - {} file{} written",
                timestamp(),
                result.task,
                crate::build::format_duration(result.duration),
                result.outputs.len(),
                if result.outputs.len() == 1 { "" } else { "s" }
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildMode, SluiceConfig};

    #[test]
    fn test_slot_idle_starts_run() {
        let slot = TaskSlot::new(TaskName::Sass);
        assert!(slot.is_idle());
        assert!(slot.request());
        assert!(!slot.is_idle());
        assert!(!slot.finish());
        assert!(slot.is_idle());
    }

    #[test]
    fn test_slot_queues_one_rerun() {
        let slot = TaskSlot::new(TaskName::Sass);
        assert!(slot.request());
        // three changes while running collapse into one rerun
        assert!(!slot.request());
        assert!(!slot.request());
        assert!(!slot.request());
        assert!(slot.finish());
        assert!(!slot.finish());
        assert!(slot.is_idle());
    }

    #[test]
    fn test_slot_reports_fix() {
        let slot = TaskSlot::new(TaskName::Sass);
        assert!(!slot.record(false));
        assert!(slot.record(true));
        assert!(!slot.record(true));
    }

    fn table() -> WatchTable {
        let ctx = BuildContext::new(SluiceConfig::default(), PathBuf::from("/p"), BuildMode::Development);
        WatchTable::new(&ctx).unwrap()
    }

    #[test]
    fn test_table_routes_paths() {
        let table = table();
        let tasks = |p: &str| table.slots_for(Path::new(p)).iter().map(|s| s.task()).collect::<Vec<_>>();

        assert_eq!(tasks("/p/src/index.html"), vec![TaskName::Html]);
        assert_eq!(tasks("/p/src/scss/components/_sprite.scss"), vec![TaskName::Sass]);
        assert_eq!(tasks("/p/src/img/icons/home.png"), vec![TaskName::Img]);
        assert_eq!(tasks("/p/src/fonts/a.woff2"), vec![TaskName::Fonts]);
        assert!(tasks("/p/src/js/index.js").is_empty());
        assert!(tasks("/p/dist/index.html").is_empty());
    }

    #[test]
    fn test_table_roots_collapse_nested() {
        assert_eq!(table().roots(), vec![PathBuf::from("/p/src")]);
    }

    // ------------------------------------------------------------------------
    // Watch loop
    // ------------------------------------------------------------------------

    use crate::reload::{ReloadEvent, ReloadKind};
    use std::fs;
    use tokio::sync::{broadcast, oneshot};

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn project() -> (tempfile::TempDir, TaskRunner) {
        let temp = tempfile::TempDir::new().unwrap();
        let root = fs::canonicalize(temp.path()).unwrap();
        write(&root, "src/scss/main.scss", ".a { width: 1px; }\n");
        write(&root, "src/js/index.js", "import { n } from './n.js';\nconsole.log(n);\n");
        write(&root, "src/js/n.js", "export const n = 1;\n");

        let mut config = SluiceConfig::default();
        config.style.delay_ms = 0;
        config.server.tunnel = None;
        config.watch.debounce_ms = 20;
        (temp, TaskRunner::new(BuildContext::new(config, root, BuildMode::Development)))
    }

    async fn next_matching(
        rx: &mut broadcast::Receiver<ReloadEvent>,
        wanted: impl Fn(&ReloadEvent) -> bool,
    ) -> ReloadEvent {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                match rx.recv().await {
                    Ok(event) if wanted(&event) => return event,
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => panic!("reload hub closed"),
                }
            }
        })
        .await
        .expect("no matching reload event")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scss_change_sends_css_reload() {
        let (_temp, runner) = project();
        let root = runner.context().project_root().to_path_buf();
        let mut events = runner.context().reload().subscribe();
        let (stop, stopped) = oneshot::channel::<()>();

        let edits = async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            write(&root, "src/scss/main.scss", ".a { width: 42px; }\n");
            let event = next_matching(&mut events, |e| e.kind == ReloadKind::Css).await;
            let _ = stop.send(());
            event
        };
        let (watched, event) = tokio::join!(
            run(runner.clone(), async move {
                let _ = stopped.await;
            }),
            edits
        );

        watched.unwrap();
        assert_eq!(event.path.as_deref(), Some("/css/main.css"));
        let css = fs::read_to_string(root.join("dist/css/main.css")).unwrap();
        assert!(css.contains("42px"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_script_module_change_rebundles() {
        let (_temp, runner) = project();
        let root = runner.context().project_root().to_path_buf();
        let mut events = runner.context().reload().subscribe();
        let (stop, stopped) = oneshot::channel::<()>();
        let is_bundle = |e: &ReloadEvent| e.kind == ReloadKind::Full;

        let edits = async {
            // no modules known yet, so watching starts with a bundle
            next_matching(&mut events, is_bundle).await;
            let modules = runner.script().modules();
            tokio::time::sleep(Duration::from_millis(300)).await;

            write(&root, "src/js/n.js", "export const n = 42;\n");
            next_matching(&mut events, is_bundle).await;
            let _ = stop.send(());
            modules
        };
        let (watched, modules) = tokio::join!(
            run(runner.clone(), async move {
                let _ = stopped.await;
            }),
            edits
        );

        watched.unwrap();
        assert!(modules.contains(&root.join("src/js/n.js")));
        let bundle = fs::read_to_string(root.join("dist/js/index.js")).unwrap();
        assert!(bundle.contains("42"));
    }
}
