//! Structured logging.
//!
//! # Responsibilities
//! - Install the global `tracing` subscriber
//! - Pick the level from `RUST_LOG`, falling back to configuration

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a `fmt` subscriber. `RUST_LOG` takes precedence over `level`.
///
/// Calling this more than once keeps the first subscriber.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("raw_http={level},httpserver={level}").into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
