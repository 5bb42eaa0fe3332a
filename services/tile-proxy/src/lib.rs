//! Tile cache proxy.
//!
//! Serves `/{source}/{z}/{x}/{y}.png` from a local [`TileStore`], fetching
//! and storing misses from the configured upstream provider.
//!
//! [`TileStore`]: tile_store::TileStore

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod server;
pub mod state;
pub mod upstream;

pub use config::ProxyConfig;
pub use server::{build_router, run_server};
pub use state::AppState;
pub use upstream::{HttpTileFetcher, TileFetcher};
