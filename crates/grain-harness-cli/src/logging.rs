// crates/grain-harness-cli/src/logging.rs
// ============================================================================
// Module: CLI Logging
// Description: Tracing subscriber setup for the CLI.
// Purpose: Route library lifecycle events to stderr, leaving stdout for results.
// Dependencies: tracing-subscriber
// ============================================================================

//! Tracing subscriber installation for the `grain-harness` binary.

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `default_filter`.
///
/// # Errors
///
/// Returns a message when the filter is invalid or a subscriber is already set.
pub fn init_tracing(default_filter: &str) -> Result<(), String> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|err| format!("invalid log filter {default_filter}: {err}"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| format!("failed to initialize tracing subscriber: {err}"))
}
