//! Tracing setup for the `bulkops` binary.
//!
//! The library only emits `tracing` events and `metrics` counters; installing a subscriber or a
//! metrics recorder is left to the application. Log levels follow `RUST_LOG`, defaulting to
//! `info`.

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install a console subscriber filtered by `RUST_LOG`.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    info!("Telemetry initialized");
    Ok(())
}
