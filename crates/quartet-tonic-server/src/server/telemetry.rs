//! Log subscriber initialization for the server binary.
//!
//! Filtering follows the `RUST_LOG` environment variable and defaults to
//! `info`. Events are rendered by the standard `fmt` layer; there is no
//! exporter pipeline behind it.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}
