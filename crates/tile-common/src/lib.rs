//! Common types and utilities shared across the tilecue crates and services.

pub mod bbox;
pub mod error;
pub mod source;
pub mod tile;

pub use bbox::BoundingBox;
pub use error::{TileError, TileResult};
pub use source::{AxisOrder, SourceRegistry, TileSource};
pub use tile::{latlon_to_tile, tiles_around_point, tiles_in_bounds, TileCoord, MAX_ZOOM};
