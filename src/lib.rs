pub mod config;
pub mod engine;
pub mod error;
pub mod storage;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging.
///
/// This is also the engine's fallback channel: storage failures inside
/// `log()` surface here instead of propagating to the caller.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
