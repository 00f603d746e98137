//! Structured logging.
//!
//! `RUST_LOG` takes precedence; otherwise the configured level applies to
//! the gateway and its HTTP middleware.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggerConfig;

/// Install the global subscriber.
pub fn init_logging(config: &LoggerConfig) {
    let level = &config.level;
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("api_gateway={level},tower_http={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
