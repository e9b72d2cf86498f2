//! Structured logging using **tracing**.
//!
//! Library code emits events through the `tracing` macros directly. Binaries
//! call [`init_structured_logging`] once to install a JSON subscriber on stderr,
//! which keeps stdout free for reports (CLI) and the protocol stream (LSP).

use tracing::{error, info, warn};

/// Initializes the global tracing subscriber.
///
/// Safe to call more than once: later calls are ignored.
///
/// # Environment Variables
/// - `RUST_LOG`: Controls log filtering (e.g., `RUST_LOG=cssxref_core=debug`)
pub fn init_structured_logging() {
    let _ = tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_level(true)
        .with_target(true)
        .with_current_span(true)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Logs a warning event.
pub fn log_warn(message: &str) {
    warn!(detail = %message);
}

/// Logs an info event.
pub fn log_info(message: &str) {
    info!(detail = %message);
}

/// Logs an error event.
pub fn log_error(message: &str) {
    error!(detail = %message);
}
