//! Tracing subscriber initialization for the application binaries.

use anyhow::anyhow;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the stdout tracing subscriber, honoring `RUST_LOG` and
/// defaulting to `INFO`.
pub fn init() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .try_init()
        .map_err(|e| anyhow!("failed to initialize tracing logger: {}", e))?;

    Ok(())
}
