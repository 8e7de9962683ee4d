//! Logging setup, trimmed of the OpenTelemetry export layers — there's
//! no HTTP surface on an mDNS peer for a trace collector to correlate
//! spans against, just the `tracing::instrument`ed actor loop in
//! `node.rs`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Builds the env filter the fmt layer is gated on, defaulting to `info`
/// when `RUST_LOG` isn't set.
pub fn build_loglevel_filter_layer() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs a plain `fmt` subscriber as the global default. Call once,
/// from `main`.
pub fn init_subscriber() {
    let subscriber = tracing_subscriber::registry()
        .with(build_loglevel_filter_layer())
        .with(tracing_subscriber::fmt::layer());
    subscriber.init();
}
