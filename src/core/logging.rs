//! Tracing subscriber setup for hosts embedding the orchestrator.

use tracing::Level;

/// Install a fmt subscriber writing to stderr.
///
/// Stdout is left untouched because protocol layers typically own it. Returns
/// `false` when a global subscriber was already installed.
pub fn init_tracing(verbose: bool) -> bool {
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
