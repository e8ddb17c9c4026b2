//! Logging setup on top of `tracing`.
//!
//! Task progress ("Starting 'build:sass'...", per-file image lines, bundle
//! sizes) goes through `tracing`; end-of-run summaries are printed directly.
//! `RUST_LOG` overrides the default filter unless `-v` or `-q` is given.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "sluice=info";

/// Filter used when `RUST_LOG` does not apply.
fn default_directive(verbose: bool, quiet: bool) -> Option<&'static str> {
    if verbose {
        Some("sluice=debug")
    } else if quiet {
        Some("sluice=error")
    } else {
        None
    }
}

/// Install the global subscriber. Call once, before any logging.
///
/// `verbose` wins over `quiet`.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let filter = match default_directive(verbose, quiet) {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    let fmt_layer = fmt::layer().with_target(false).with_level(true).with_ansi(!no_color).compact();

    // A second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry().with(filter).with(fmt_layer).try_init();
}
