//! Diagnostic tracing to stderr.
//!
//! Filtered by `RUST_LOG`, defaulting to `warn`. Store corruption recovery
//! and failed dispatches surface at that level.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Later calls are ignored, so embedding
/// applications that already installed one keep theirs.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
