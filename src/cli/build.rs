//! Task command implementation

use std::path::PathBuf;
use std::process::ExitCode;

use futures::FutureExt;

use super::{GlobalArgs, EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{ctrl_c, BuildContext, TaskName, TaskRunner};
use crate::config::{load_config, merge_cli_overrides, BuildMode, CliOverrides};

/// Load the project, run `task` and report the result.
pub fn run_task(task: TaskName, args: &GlobalArgs) -> ExitCode {
    let (mut config, root) = match load_config(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    merge_cli_overrides(&mut config, &CliOverrides { port: args.port, no_tunnel: args.no_tunnel });

    // Watchers and the bundler report canonical paths
    let root: PathBuf = std::fs::canonicalize(&root).unwrap_or(root);
    let mode = BuildMode::from_env();
    tracing::debug!("project root {} ({} mode)", root.display(), mode);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: cannot start runtime: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let ctx = BuildContext::new(config, root, mode).with_verbose(args.verbose);
    let runner = TaskRunner::new(ctx);
    let shutdown = ctrl_c().boxed().shared();

    match runtime.block_on(runner.run(task, shutdown)) {
        Ok(result) => {
            if !task.is_long_running() {
                println!("{}", result.summary());
            }
            for failure in result.failures() {
                eprintln!("  {}: {}", failure.task, failure.status);
            }
            if result.is_success() {
                ExitCode::from(EXIT_SUCCESS)
            } else {
                ExitCode::from(EXIT_ERROR)
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
