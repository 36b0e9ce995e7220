// Tracing initialization with a configurable, reloadable log level.
use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

pub fn init_tracing() {
    // RUST_LOG wins over the configured level.
    let base_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (reload_layer, handle) = reload::Layer::new(base_filter);
    let _ = LOG_RELOAD_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer())
        .try_init();
}

/// Applies the configured log level once the config file has been read,
/// unless RUST_LOG is set.
pub fn apply_logging_level(level: &str) {
    if std::env::var("RUST_LOG").is_ok() {
        return;
    }
    if let Some(handle) = LOG_RELOAD_HANDLE.get() {
        let level = level.to_string();
        let _ = handle.modify(move |filter| {
            *filter = EnvFilter::new(level);
        });
    }
}
