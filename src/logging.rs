//! Tracing setup for the CLI.
//!
//! Logs go to stderr so stdout carries only pipeline output.

use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Filter directive for a `-v` count: warnings by default, then debug, then trace
pub fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "parcelmap=warn",
        1 => "parcelmap=debug",
        _ => "parcelmap=trace",
    }
}

/// Install the global subscriber. `RUST_LOG`, when set, overrides the verbosity flag.
pub fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_for(verbose)));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .with_line_number(verbose >= 3)
        .try_init();

    if installed.is_ok() {
        debug!("parcelmap started with verbosity level: {}", verbose);
    }
}
