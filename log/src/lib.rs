//! Logging setup for lineview embedders and tests.
//!
//! The engine crates only *emit* `tracing` events; installing a subscriber is
//! the embedding application's job. This crate provides the standard stdout
//! setup used by the workspace's own tests and by embedders that have nothing
//! fancier of their own.
//!
//! ## Environment Variables
//!
//! 1. **`LINEVIEW_LOG`** (highest priority) - lineview-specific logging control
//! 2. **`RUST_LOG`** - Standard tracing environment variable
//! 3. **Default** - `warn` globally, `info` for lineview crates

use std::env;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize stdout logging.
///
/// Respects the environment variable priority described in the module docs:
/// [`LINEVIEW_LOG`] > [`RUST_LOG`] > default settings.
///
/// Safe to call multiple times -- will not crash if logging is already
/// initialized.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = create_filter()?;
    fmt().with_env_filter(filter).try_init()?;
    Ok(())
}

/// Initialize logging for tests.
///
/// Identical to [`init`] but swallows the already-initialized error, with a
/// name that makes it clear this is safe to call from every test.
pub fn test() {
    let _ = init();
}

/// Create the appropriate [`EnvFilter`] based on environment variables.
///
/// Implements the priority system: [`LINEVIEW_LOG`] > [`RUST_LOG`] > defaults.
fn create_filter() -> Result<EnvFilter, Box<dyn std::error::Error + Send + Sync>> {
    if let Ok(lineview_log) = env::var("LINEVIEW_LOG") {
        return Ok(expand_lineview_log(&lineview_log));
    }

    if let Ok(rust_log) = env::var("RUST_LOG") {
        return Ok(EnvFilter::new(rust_log));
    }

    // Default: warn globally, info for lineview crates
    Ok(EnvFilter::new("warn,lineview_display=info"))
}

/// Expand [`LINEVIEW_LOG`] values into full tracing filter strings.
///
/// A bare level like `LINEVIEW_LOG=debug` becomes `warn,lineview_display=debug`;
/// anything with module-specific syntax is used as-is so advanced usage like
/// `LINEVIEW_LOG=lineview_display=trace` still works.
fn expand_lineview_log(lineview_log: &str) -> EnvFilter {
    if lineview_log.contains('=') || lineview_log.contains(':') || lineview_log.contains(',') {
        return EnvFilter::new(lineview_log);
    }

    EnvFilter::new(format!("warn,lineview_display={lineview_log}"))
}
