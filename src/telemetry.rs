//! Tracing setup for the command-line tool

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install a stderr subscriber. `RUST_LOG` wins over the default level,
/// which is `warn`, or `debug` for this crate when `verbose` is set.
pub fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let default = if verbose { "warn,resen=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    tracing::debug!("tracing initialized");
    Ok(())
}
