//! Operator CLI for pre-caching map animations ahead of broadcast.

mod diagnose;
mod progress;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use precache::{
    warm_areas, AnimationPlan, BroadcastArea, CueSession, HttpProxyClient, LatLng, MapStyle,
    PlannerConfig, PreloadConfig, Preloader, Viewport, DEFAULT_PROXY_URL, DEFAULT_SOURCE,
};
use tile_store::TileStore;

use crate::progress::run_with_progress;

#[derive(Parser)]
#[command(name = "cue")]
#[command(about = "Pre-cache map tiles for broadcast animations", long_about = None)]
struct Cli {
    /// Log level
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pre-cache a point-to-point pan
    Pan {
        /// Start point as LAT,LNG
        #[arg(long, allow_hyphen_values = true)]
        from: LatLng,

        /// End point as LAT,LNG
        #[arg(long, allow_hyphen_values = true)]
        to: LatLng,

        /// Zoom level of the pan
        #[arg(short, long)]
        zoom: f64,

        /// Path samples (defaults to 50)
        #[arg(long)]
        steps: Option<u32>,

        #[command(flatten)]
        cue: CueArgs,
    },

    /// Pre-cache a zoom around a point
    Zoom {
        /// Centre as LAT,LNG
        #[arg(long, allow_hyphen_values = true)]
        center: LatLng,

        /// Starting zoom
        #[arg(long, requires = "to", conflicts_with = "level")]
        from: Option<f64>,

        /// Final zoom
        #[arg(long, requires = "from", conflicts_with = "level")]
        to: Option<f64>,

        /// Target level of a simple zoom cue (starts two levels out)
        #[arg(long, required_unless_present = "from")]
        level: Option<f64>,

        #[command(flatten)]
        cue: CueArgs,
    },

    /// Warm the cache for preset broadcast areas
    Warm {
        /// Area name (europe, north-america, global); all presets if omitted
        #[arg(short, long)]
        area: Vec<String>,

        #[command(flatten)]
        proxy: ProxyArgs,
    },

    /// Show where a point's tile lives and what is cached around it
    Diagnose {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lng: f64,

        #[arg(short, long)]
        zoom: u32,

        /// Tile source key
        #[arg(long, default_value = DEFAULT_SOURCE)]
        source: String,

        /// Cache root directory
        #[arg(long, default_value = "./tile-cache", env = "TILE_CACHE_DIR")]
        cache_dir: PathBuf,

        /// YAML tile source table (built-in sources if omitted)
        #[arg(long, env = "TILE_SOURCES_FILE")]
        sources: Option<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Cached tiles and bytes per source
    Stats {
        /// Cache root directory
        #[arg(long, default_value = "./tile-cache", env = "TILE_CACHE_DIR")]
        cache_dir: PathBuf,

        /// Only this source
        #[arg(long)]
        source: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

/// Where the proxy is and how hard to push it.
#[derive(Args)]
struct ProxyArgs {
    /// Tile proxy base URL
    #[arg(long, default_value = DEFAULT_PROXY_URL, env = "TILE_PROXY_URL")]
    proxy_url: String,

    /// Tile source key
    #[arg(long, default_value = DEFAULT_SOURCE)]
    source: String,

    /// Tiles requested concurrently
    #[arg(long, default_value = "5")]
    batch_size: usize,

    /// Pause between batches in milliseconds
    #[arg(long, default_value = "50")]
    batch_delay_ms: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,
}

impl ProxyArgs {
    fn preloader(&self) -> Result<Preloader> {
        let client = HttpProxyClient::new(&self.proxy_url, Duration::from_secs(self.timeout_secs))
            .context("Failed to create proxy client")?;
        let config = PreloadConfig {
            batch_size: self.batch_size,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
        };
        Ok(Preloader::new(Arc::new(client), config))
    }
}

/// Session settings shared by animation cues.
#[derive(Args)]
struct CueArgs {
    #[command(flatten)]
    proxy: ProxyArgs,

    /// Active map style; only cached-satellite pre-caches
    #[arg(long, default_value = "cached-satellite")]
    style: MapStyle,

    /// Current view as WEST,SOUTH,EAST,NORTH@ZOOM
    #[arg(long, allow_hyphen_values = true)]
    viewport: Option<Viewport>,

    /// Tiles of margin around each path point
    #[arg(long, default_value = "4")]
    buffer_radius: u32,
}

impl CueArgs {
    fn session(&self) -> CueSession {
        let mut session = CueSession::new(self.style, self.proxy.source.clone()).with_planner(
            PlannerConfig {
                buffer_radius: self.buffer_radius,
                ..PlannerConfig::default()
            },
        );
        if let Some(viewport) = self.viewport {
            session = session.with_viewport(viewport);
        }
        session
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match cli.command {
        Commands::Pan {
            from,
            to,
            zoom,
            steps,
            cue,
        } => {
            let plan = AnimationPlan::PointToPoint {
                from,
                to,
                zoom,
                steps,
            };
            run_cue(&cue, &plan).await
        }
        Commands::Zoom {
            center,
            from,
            to,
            level,
            cue,
        } => {
            let plan = match (from, to, level) {
                (Some(from_zoom), Some(to_zoom), _) => AnimationPlan::Zoom {
                    center,
                    from_zoom,
                    to_zoom,
                },
                (_, _, Some(level)) => AnimationPlan::simple_zoom(center, level),
                _ => anyhow::bail!("either --from and --to, or --level, is required"),
            };
            run_cue(&cue, &plan).await
        }
        Commands::Warm { area, proxy } => run_warm(&area, &proxy).await,
        Commands::Diagnose {
            lat,
            lng,
            zoom,
            source,
            cache_dir,
            sources,
            json,
        } => {
            let registry = match sources {
                Some(path) => tile_common::SourceRegistry::load(&path)?,
                None => tile_common::SourceRegistry::builtin(),
            };
            let report = diagnose::diagnose(
                &TileStore::new(cache_dir),
                &registry,
                &source,
                LatLng::new(lat, lng),
                zoom,
            )
            .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report);
            }
            Ok(())
        }
        Commands::Stats {
            cache_dir,
            source,
            json,
        } => run_stats(&TileStore::new(cache_dir), source.as_deref(), json).await,
    }
}

async fn run_cue(args: &CueArgs, plan: &AnimationPlan) -> Result<()> {
    let session = args.session();
    let preloader = args.proxy.preloader()?;

    let planned = session.plan(plan).len();
    println!(
        "Cue: {} tiles planned for {} ({})",
        planned, session.source, session.style
    );

    let report = run_with_progress(&preloader, session.cue(&preloader, plan)).await?;
    println!("{}", report.status_message());
    Ok(())
}

async fn run_warm(names: &[String], args: &ProxyArgs) -> Result<()> {
    let areas = if names.is_empty() {
        BroadcastArea::presets()
    } else {
        names
            .iter()
            .map(|name| {
                BroadcastArea::preset(name)
                    .with_context(|| format!("Unknown broadcast area '{}'", name))
            })
            .collect::<Result<Vec<_>>>()?
    };

    let preloader = args.preloader()?;
    let warm = run_with_progress(&preloader, warm_areas(&preloader, &areas, &args.source))
        .await?
        .context("Tile proxy is not reachable")?;

    for (name, report) in &warm.areas {
        println!(
            "{:<16} {:>6} tiles  {:>6} cached  {:>4} failed",
            name,
            report.total,
            report.cached_count(),
            report.failed
        );
    }
    println!("{}", warm.total().status_message());
    Ok(())
}

async fn run_stats(store: &TileStore, source: Option<&str>, json: bool) -> Result<()> {
    let stats = store.stats(source).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    if stats.is_empty() {
        println!("No cached tiles under {}", store.root().display());
        return Ok(());
    }

    for (source, usage) in &stats.sources {
        println!(
            "{:<20} {:>8} tiles  {:>12} bytes",
            source, usage.tiles, usage.bytes
        );
    }
    println!(
        "{:<20} {:>8} tiles  {:>12} bytes",
        "total",
        stats.total_tiles(),
        stats.total_bytes()
    );
    Ok(())
}
