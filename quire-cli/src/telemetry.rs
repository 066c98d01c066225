//! Tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::CliError;

/// Install the global subscriber. The filter comes from `RUST_LOG`, falling
/// back to `quire=info`.
pub fn init(json: bool) -> Result<(), CliError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quire=info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };
    result.map_err(|e| CliError::Telemetry(e.to_string()))
}
