//! Tile cache proxy server.
//!
//! Serves satellite tiles from a local disk cache, fetching misses from the
//! configured upstream providers.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use tile_proxy::config::{DEFAULT_LISTEN, DEFAULT_USER_AGENT};
use tile_proxy::{run_server, AppState, ProxyConfig};

#[derive(Parser, Debug)]
#[command(name = "tile-proxy")]
#[command(about = "Caching proxy for slippy-map satellite tiles")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = DEFAULT_LISTEN, env = "TILE_PROXY_LISTEN")]
    listen: SocketAddr,

    /// Cache root directory
    #[arg(long, default_value = "./tile-cache", env = "TILE_CACHE_DIR")]
    cache_dir: PathBuf,

    /// YAML tile source table (built-in ESRI and Google sources if omitted)
    #[arg(long, env = "TILE_SOURCES_FILE")]
    sources: Option<PathBuf>,

    /// Upstream request timeout in seconds
    #[arg(long, default_value = "30")]
    upstream_timeout_secs: u64,

    /// User agent sent to upstream providers
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Serve Prometheus metrics on this address
    #[arg(long, env = "TILE_PROXY_METRICS_LISTEN")]
    metrics_listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    if let Some(addr) = args.metrics_listen {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(addr = %addr, "Prometheus metrics exporter initialized");
    }

    let config = ProxyConfig {
        listen: args.listen,
        cache_dir: args.cache_dir,
        sources_file: args.sources,
        upstream_timeout: Duration::from_secs(args.upstream_timeout_secs),
        user_agent: args.user_agent,
    };

    tokio::fs::create_dir_all(&config.cache_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.cache_dir.display()))?;

    let state = Arc::new(AppState::new(&config).context("Failed to initialize proxy state")?);

    run_server(state, config.listen).await
}
