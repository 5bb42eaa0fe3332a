//! Slippy-map tile addressing (Web Mercator z/x/y).
//!
//! Zoom level `z` is a `2^z × 2^z` grid of tiles; `x` grows eastwards from
//! the antimeridian and `y` grows southwards from the northern Mercator
//! limit (~85.0511°).

use std::collections::BTreeSet;
use std::f64::consts::PI;
use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::BoundingBox;

/// Highest zoom level the mapper will address (`2^30` tiles per side).
pub const MAX_ZOOM: u32 = 30;

/// A tile coordinate (z/x/y).
///
/// Ordering is by zoom, then column, then row, which keeps tile sets
/// grouped by zoom level when iterated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Build a coordinate only if it addresses a real tile.
    pub fn checked(z: u32, x: u32, y: u32) -> Option<Self> {
        let coord = Self { z, x, y };
        coord.is_valid().then_some(coord)
    }

    /// True when `z <= MAX_ZOOM` and both `x` and `y` lie in `[0, 2^z)`.
    pub fn is_valid(&self) -> bool {
        if self.z > MAX_ZOOM {
            return false;
        }
        let n = tiles_per_side(self.z);
        (self.x as u64) < n && (self.y as u64) < n
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Number of tiles along one axis at `zoom`.
pub fn tiles_per_side(zoom: u32) -> u64 {
    1u64 << zoom.min(MAX_ZOOM)
}

/// Unclamped fractional-free tile indices for a point. May fall outside
/// the grid for longitudes of exactly 180° or latitudes beyond the
/// Mercator limit.
fn raw_tile_index(lat: f64, lon: f64, zoom: u32) -> (i64, i64) {
    let n = tiles_per_side(zoom) as f64;

    let x = ((lon + 180.0) / 360.0 * n).floor();
    let lat_rad = lat.to_radians();
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor();

    (x as i64, y as i64)
}

fn clamp_index(value: i64, zoom: u32) -> u32 {
    let max = tiles_per_side(zoom) as i64 - 1;
    value.clamp(0, max) as u32
}

/// Convert lat/lon to Web Mercator tile coordinates.
///
/// The result is always a valid tile: points on the east edge or beyond the
/// polar Mercator limit snap to the nearest edge tile.
pub fn latlon_to_tile(lat: f64, lon: f64, zoom: u32) -> TileCoord {
    let zoom = zoom.min(MAX_ZOOM);
    let (x, y) = raw_tile_index(lat, lon, zoom);

    TileCoord {
        z: zoom,
        x: clamp_index(x, zoom),
        y: clamp_index(y, zoom),
    }
}

/// Every tile within `radius` tiles (Chebyshev distance) of the tile
/// containing the point, clipped to the grid.
///
/// Unclipped this is a `(2·radius+1)²` square.
pub fn tiles_around_point(lat: f64, lon: f64, zoom: u32, radius: u32) -> BTreeSet<TileCoord> {
    let center = latlon_to_tile(lat, lon, zoom);
    let n = tiles_per_side(center.z) as i64;
    let r = radius as i64;

    let x_range = (center.x as i64 - r).max(0)..=(center.x as i64 + r).min(n - 1);
    let y_range = (center.y as i64 - r).max(0)..=(center.y as i64 + r).min(n - 1);

    let mut tiles = BTreeSet::new();
    for x in x_range {
        for y in y_range.clone() {
            tiles.insert(TileCoord::new(center.z, x as u32, y as u32));
        }
    }
    tiles
}

/// Every tile covering a bounding box at `zoom`, corners inclusive.
///
/// Boxes crossing the antimeridian wrap from the west edge through the last
/// column and continue from column 0 to the east edge.
pub fn tiles_in_bounds(bbox: &BoundingBox, zoom: u32) -> BTreeSet<TileCoord> {
    let zoom = zoom.min(MAX_ZOOM);
    let nw = latlon_to_tile(bbox.north(), bbox.west(), zoom);
    let se = latlon_to_tile(bbox.south(), bbox.east(), zoom);
    let last = tiles_per_side(zoom) - 1;

    let columns: Vec<RangeInclusive<u64>> = if nw.x <= se.x {
        vec![nw.x as u64..=se.x as u64]
    } else {
        vec![nw.x as u64..=last, 0..=se.x as u64]
    };

    let mut tiles = BTreeSet::new();
    for range in columns {
        for x in range {
            for y in nw.y..=se.y {
                tiles.insert(TileCoord::new(zoom, x as u32, y));
            }
        }
    }
    tiles
}

/// Convert Web Mercator tile coordinates to lat/lon bounds.
pub fn tile_to_latlon_bounds(coord: &TileCoord) -> BoundingBox {
    let n = tiles_per_side(coord.z) as f64;

    let lon_min = coord.x as f64 / n * 360.0 - 180.0;
    let lon_max = (coord.x as f64 + 1.0) / n * 360.0 - 180.0;

    let lat_max = (PI * (1.0 - 2.0 * coord.y as f64 / n))
        .sinh()
        .atan()
        .to_degrees();
    let lat_min = (PI * (1.0 - 2.0 * (coord.y as f64 + 1.0) / n))
        .sinh()
        .atan()
        .to_degrees();

    BoundingBox::new(lon_min, lat_min, lon_max, lat_max)
}

/// Integer zoom levels needed to render anywhere between two (possibly
/// fractional) zooms: `floor(min)..=ceil(max)`, clamped to `[0, MAX_ZOOM]`.
pub fn zoom_levels(from: f64, to: f64) -> RangeInclusive<u32> {
    let (lo, hi) = if from <= to { (from, to) } else { (to, from) };
    let clamp = |z: f64| z.clamp(0.0, MAX_ZOOM as f64) as u32;
    clamp(lo.floor())..=clamp(hi.ceil())
}
