//! Logging bootstrap

use tracing_subscriber::EnvFilter;

use flowup_core::{FlowError, FlowResult};

use crate::LoggingConfig;

/// Install the global `tracing` subscriber.
///
/// Fails on an unparsable filter or if a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> FlowResult<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| FlowError::InvalidConfig(format!("log filter {:?}: {e}", config.filter)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| FlowError::InvalidConfig(format!("logging already initialized: {e}")))
}
