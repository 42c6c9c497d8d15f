use edgegate::cache::{CachedForwarder, MemoryCache};
use edgegate::config::Config;
use edgegate::dispatch::HttpDispatcher;
use edgegate::forwarder::EdgeForwarder;
use edgegate::proxy::{Gateway, ProxyServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

const PKG_NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("edgegate=debug".parse().expect("valid log directive")),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path.display(), error = %e, "Failed to load configuration");
        e
    })?;

    info!(path = %config_path.display(), "Configuration loaded");
    print_startup_banner(&config);

    // Build the outbound dispatcher and the gateway
    let request_timeout = config.backend.request_timeout_secs.map(Duration::from_secs);
    let dispatcher = HttpDispatcher::new(request_timeout)?;
    let forwarder = EdgeForwarder::new(dispatcher, config.backend.base_url.clone());

    let gateway = if config.cache.enabled {
        info!(
            max_age_secs = config.cache.max_age_secs,
            path_marker = %config.cache.path_marker,
            "Response cache enabled"
        );
        Gateway::Cached(CachedForwarder::new(
            forwarder,
            MemoryCache::new(),
            Duration::from_secs(config.cache.max_age_secs),
            config.cache.path_marker.clone(),
        ))
    } else {
        Gateway::Direct(forwarder)
    };

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let bind_addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .map_err(|e| {
            error!(bind = %config.server.bind, port = config.server.port, error = %e, "Invalid bind address");
            anyhow::anyhow!("Invalid bind address: {}", e)
        })?;

    let server = ProxyServer::new(bind_addr, Arc::new(gateway), shutdown_rx);
    let server_handle = tokio::spawn(server.run());

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);

    server_handle.await??;
    info!("Shutdown complete");
    Ok(())
}

fn print_startup_banner(config: &Config) {
    info!(name = PKG_NAME, version = VERSION, "Starting edge proxy");
    info!(
        bind = %config.server.bind,
        port = config.server.port,
        "Server configuration"
    );
    info!(
        base_url = %config.backend.base_url,
        request_timeout_secs = config.backend.request_timeout_secs,
        "Backend configuration"
    );
}
