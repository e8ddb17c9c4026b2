//! Sluice - command-line entry point

use std::process::ExitCode;

use sluice::cli;

fn main() -> ExitCode {
    cli::run()
}
