//! Sluice - frontend asset pipeline
//!
//! Turns a `src/` tree into a deployable `dist/` tree through a small graph
//! of named tasks:
//! - copy HTML pages and fonts
//! - compile SCSS, autoprefix, and strip unused rules in production
//! - bundle the script entry point (inline source maps in development,
//!   minified in production)
//! - pack icons into a sprite sheet plus SCSS partial
//! - optimize images losslessly
//! - serve `dist/` with live reload and rebuild on change

pub mod atlas;
pub mod build;
pub mod cli;
pub mod config;
pub mod logger;
pub mod notifier;
pub mod optimize;
pub mod reload;
pub mod server;
pub mod tasks;
pub mod watch;
