//! Command-line interface implementation
//!
//! One subcommand per task, named exactly like the task (`build:sass`,
//! `clean`, ...). No subcommand runs `default`.

mod build;
mod tasks;

use crate::build::TaskName;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Sluice - frontend asset pipeline with a live-reload dev server
#[derive(Parser, Debug)]
#[command(name = "sluice")]
#[command(about = "Sluice - build HTML, SCSS, scripts, sprites, images and fonts; serve with live reload")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Options shared by every task.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file (default: nearest sluice.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only show errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Dev server port (overrides [server] port)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Do not open the public tunnel
    #[arg(long, global = true)]
    pub no_tunnel: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Copy HTML pages to the output directory
    #[command(name = "build:html")]
    BuildHtml,
    /// Compile SCSS, autoprefix, and purge (production) into CSS
    #[command(name = "build:sass")]
    BuildSass,
    /// Bundle the script entry point
    #[command(name = "build:js")]
    BuildJs,
    /// Pack icons into a sprite sheet and write the SCSS partial
    #[command(name = "build:sprite")]
    BuildSprite,
    /// Optimize changed images (runs build:sprite first)
    #[command(name = "build:img")]
    BuildImg,
    /// Copy fonts to the output directory
    #[command(name = "build:fonts")]
    BuildFonts,
    /// Delete the output directory
    Clean,
    /// Serve the output directory with live reload
    Webserver,
    /// Run every build task
    Build,
    /// Rebuild on source changes
    Watch,
    /// Build, then serve and watch (the default)
    Default,
    /// List tasks and their dependencies
    Tasks,
}

impl Commands {
    /// The task this command runs, `None` for informational commands.
    pub fn task(self) -> Option<TaskName> {
        Some(match self {
            Commands::BuildHtml => TaskName::Html,
            Commands::BuildSass => TaskName::Sass,
            Commands::BuildJs => TaskName::Js,
            Commands::BuildSprite => TaskName::Sprite,
            Commands::BuildImg => TaskName::Img,
            Commands::BuildFonts => TaskName::Fonts,
            Commands::Clean => TaskName::Clean,
            Commands::Webserver => TaskName::Webserver,
            Commands::Build => TaskName::Build,
            Commands::Watch => TaskName::Watch,
            Commands::Default => TaskName::Default,
            Commands::Tasks => return None,
        })
    }
}

/// Parse arguments, run the requested task and map the outcome to an exit
/// code.
pub fn run() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_INVALID_ARGS } else { EXIT_SUCCESS };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    crate::logger::init_logger(cli.global.verbose, cli.global.quiet, cli.global.no_color);

    match cli.command.unwrap_or(Commands::Default).task() {
        Some(task) => build::run_task(task, &cli.global),
        None => tasks::run_list(),
    }
}
