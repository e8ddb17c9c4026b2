//! Build pipeline module for sluice
//!
//! Provides the task graph and the machinery that runs it.
//!
//! # Overview
//!
//! - **Discovery**: resolve glob selectors from the path table into files
//! - **Graph**: named tasks, aggregates and the one dependency edge
//!   (`build:img` after `build:sprite`)
//! - **Execution**: [`TaskRunner`] fans tasks out on the tokio runtime and
//!   collects a [`BuildResult`]
//!
//! # Example
//!
//! ```ignore
//! use sluice::build::{BuildContext, TaskName, TaskRunner};
//! use sluice::config::{load_config, BuildMode};
//!
//! let (config, root) = load_config(None)?;
//! let runner = TaskRunner::new(BuildContext::new(config, root, BuildMode::from_env()));
//! let result = runner.run_tasks(&[TaskName::Build]).await?;
//! println!("{}", result.summary());
//! ```

pub mod context;
pub mod discovery;
pub mod error;
pub mod result;
pub mod runner;
pub mod task;

pub use context::*;
pub use discovery::*;
pub use error::*;
pub use result::*;
pub use runner::*;
pub use task::*;
