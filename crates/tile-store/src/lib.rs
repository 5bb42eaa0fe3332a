//! On-disk tile cache for the tile proxy.
//!
//! Tiles live at `{root}/{source}/{z}/{x}/{y}.png`, one file per tile. The
//! layout is independent of how the upstream provider orders its axes, so
//! a cached tile can always be located from its slippy-map coordinate.

mod stats;
mod store;

pub use stats::{SourceStats, StoreStats};
pub use store::TileStore;
