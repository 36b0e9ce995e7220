use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use waypoint_auth::clock::SystemClock;
use waypoint_auth::http;
use waypoint_auth::resolver::IdentityResolver;
use waypoint_auth::store::MemoryIdentityStore;

mod config;
mod observability;

use config::ServerConfig;

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From WAYPOINT_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (waypoint.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (WAYPOINT_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env if present; useful for local development, optional elsewhere.
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    observability::init_tracing();

    let (config_path, source) = resolve_config_path();
    let cfg = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(path = %config_path, source = %source, "Configuration loaded");
    observability::apply_logging_level(&cfg.logging.level);

    let clock = Arc::new(SystemClock);
    let store = Arc::new(MemoryIdentityStore::with_clock(clock.clone()));
    let resolver = match IdentityResolver::from_config(&cfg.bridge, store, clock) {
        Ok(r) => Arc::new(r),
        Err(e) => {
            eprintln!("Identity bridge initialization failed: {e}");
            std::process::exit(2);
        }
    };

    spawn_prune_task(resolver.clone(), cfg.bridge.admission.window);

    let app = http::router(resolver);
    let listener = match tokio::net::TcpListener::bind(cfg.listen).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind {}: {e}", cfg.listen);
            std::process::exit(1);
        }
    };

    tracing::info!(listen = %cfg.listen, "Waypoint identity bridge listening");

    if let Err(err) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        eprintln!("Server error: {err}");
    }
}

fn load_config(path: &str) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let cfg: ServerConfig = toml::from_str(&text)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. WAYPOINT_CONFIG environment variable
/// 3. waypoint.toml in the working directory
fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (path, ConfigSource::CliArgument);
            }
        }
    }

    if let Ok(path) = std::env::var("WAYPOINT_CONFIG") {
        if !path.is_empty() {
            return (path, ConfigSource::EnvironmentVariable);
        }
    }

    ("waypoint.toml".to_string(), ConfigSource::Default)
}

/// Periodically drops expired admission buckets so idle callers do not pin
/// memory. Runs once per admission window.
fn spawn_prune_task(resolver: Arc<IdentityResolver>, window: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(window.max(Duration::from_secs(1)));
        interval.tick().await;
        loop {
            interval.tick().await;
            let pruned = resolver.admission().prune_expired();
            if pruned > 0 {
                tracing::debug!(pruned, "admission buckets pruned");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
