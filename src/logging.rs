//! Logging setup.
//!
//! Events go to stderr so stdout stays free for command replies. RUST_LOG,
//! when set, takes precedence over the configured filter.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// Fails if the filter directive is malformed or a subscriber is already set.
pub fn init_logging(default_filter: &str) -> Result<(), String> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|e| format!("invalid log filter '{}': {}", default_filter, e))?,
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| format!("failed to install subscriber: {}", e))
}
