//! Tracing subscriber bootstrap.
//!
//! The library only emits `tracing` events. Applications and tests that
//! want them printed call `init_tracing` once at startup.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

const DEFAULT_FILTER: &str = "info";

/// Install a console subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call repeatedly; if the host already installed a global
/// subscriber, that one is kept.
pub fn init_tracing() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_filter(filter),
        );

        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized, keeping it");
        }
    });
}
