//! Task execution on the tokio runtime.

use crate::build::context::BuildContext;
use crate::build::error::TaskError;
use crate::build::result::{format_duration, BuildResult, TaskResult};
use crate::build::task::{TaskGraph, TaskName};
use crate::server::DevServer;
use crate::tasks::script::ScriptBundler;
use crate::tasks::{clean, fonts, images, markup, sprite, style};
use crate::watch;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Runs named tasks against one build context.
///
/// Cloning is cheap; clones share the script bundler and its cache.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    ctx: BuildContext,
    graph: Arc<TaskGraph>,
    script: Arc<ScriptBundler>,
}

type PendingTask = Shared<BoxFuture<'static, TaskResult>>;

impl TaskRunner {
    pub fn new(ctx: BuildContext) -> Self {
        let script = Arc::new(ScriptBundler::new(ctx.clone()));
        Self { ctx, graph: Arc::new(TaskGraph::default()), script }
    }

    pub fn context(&self) -> &BuildContext {
        &self.ctx
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn script(&self) -> &Arc<ScriptBundler> {
        &self.script
    }

    /// Run a task until it completes, or for long-running tasks until
    /// `shutdown` resolves.
    pub async fn run<S>(&self, task: TaskName, shutdown: S) -> Result<BuildResult, TaskError>
    where
        S: Future<Output = ()> + Send + Clone + 'static,
    {
        match task {
            TaskName::Webserver => {
                DevServer::bind(self.ctx.clone()).await?.serve(shutdown).await?;
                Ok(BuildResult::new())
            }
            TaskName::Watch => {
                watch::run(self.clone(), shutdown).await?;
                Ok(BuildResult::new())
            }
            TaskName::Default => {
                let result = self.run_tasks(&[TaskName::Build]).await?;
                println!("{}", result.summary());

                let server = DevServer::bind(self.ctx.clone()).await?;
                tokio::try_join!(server.serve(shutdown.clone()), watch::run(self.clone(), shutdown))?;
                Ok(result)
            }
            _ => self.run_tasks(&[task]).await,
        }
    }

    /// Run finite tasks (aggregates expanded) concurrently.
    ///
    /// Each task starts as soon as its own dependencies finish; a task whose
    /// dependency failed is reported failed without running.
    pub async fn run_tasks(&self, targets: &[TaskName]) -> Result<BuildResult, TaskError> {
        let start = Instant::now();
        let order = self.graph.order(targets)?;
        if let Some(task) = order.iter().find(|t| t.is_long_running()) {
            return Err(TaskError::NotBatchable(*task));
        }

        let mut pending: HashMap<TaskName, PendingTask> = HashMap::new();
        for &task in &order {
            let deps: Vec<PendingTask> =
                self.graph.dependencies(task).iter().filter_map(|d| pending.get(d).cloned()).collect();
            let runner = self.clone();
            let fut = async move {
                for dep in join_all(deps).await {
                    if !dep.is_success() {
                        tracing::warn!("Skipping '{}': '{}' failed", task, dep.task);
                        return TaskResult::failed(task, format!("dependency '{}' failed", dep.task), Duration::ZERO);
                    }
                }
                runner.run_leaf(task).await
            };
            pending.insert(task, fut.boxed().shared());
        }

        let results = join_all(order.iter().filter_map(|t| pending.get(t).cloned())).await;
        let mut build = BuildResult::new();
        for result in results {
            build.add_result(result);
        }
        Ok(build.with_duration(start.elapsed()))
    }

    /// Run one leaf task with start/finish logging.
    pub async fn run_leaf(&self, task: TaskName) -> TaskResult {
        tracing::info!("Starting '{}'...", task);
        let start = Instant::now();

        let outcome = match task {
            TaskName::Html => self.blocking(markup::run).await,
            TaskName::Sass => style::run(self.ctx.clone()).await,
            TaskName::Js => self.script.rebuild().await,
            TaskName::Sprite => self.blocking(sprite::run).await,
            TaskName::Img => self.blocking(images::run).await,
            TaskName::Fonts => self.blocking(fonts::run).await,
            TaskName::Clean => self.blocking(clean::run).await,
            other => Err(TaskError::NotBatchable(other)),
        };

        let duration = start.elapsed();
        match outcome {
            Ok(outputs) => {
                tracing::info!("Finished '{}' after {}", task, format_duration(duration));
                if self.ctx.is_verbose() {
                    for output in &outputs {
                        tracing::debug!("  {}", output.display());
                    }
                }
                TaskResult::from_outputs(task, outputs, duration)
            }
            Err(e) => {
                tracing::error!("'{}' errored after {}: {}", task, format_duration(duration), e);
                TaskResult::failed(task, e.to_string(), duration)
            }
        }
    }

    async fn blocking<F>(&self, f: F) -> Result<Vec<PathBuf>, TaskError>
    where
        F: FnOnce(&BuildContext) -> Result<Vec<PathBuf>, TaskError> + Send + 'static,
    {
        let ctx = self.ctx.clone();
        tokio::task::spawn_blocking(move || f(&ctx)).await?
    }
}

/// Resolves on Ctrl-C.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
