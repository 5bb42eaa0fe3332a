//! Animation path planning.
//!
//! Plans deliberately over-fetch: a wide buffer around a densely sampled
//! path, plus whatever is on screen right now. An extra cached tile costs
//! almost nothing; a missing one shows up on air.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use tile_common::tile::zoom_levels;
use tile_common::{tiles_around_point, tiles_in_bounds, BoundingBox, TileCoord, TileError};

/// A geographic point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Linear interpolation in lat/lng space.
    pub fn lerp(&self, to: &LatLng, t: f64) -> LatLng {
        LatLng {
            lat: self.lat + (to.lat - self.lat) * t,
            lng: self.lng + (to.lng - self.lng) * t,
        }
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// Parses `"lat,lng"`.
impl FromStr for LatLng {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TileError::InvalidRequest(format!("expected 'lat,lng', got '{}'", s));
        let (lat, lng) = s.split_once(',').ok_or_else(invalid)?;
        let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
        let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
        Ok(Self { lat, lng })
    }
}

/// What is currently on screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub bounds: BoundingBox,
    /// Map zoom, possibly fractional
    pub zoom: f64,
}

impl Viewport {
    pub fn new(bounds: BoundingBox, zoom: f64) -> Self {
        Self { bounds, zoom }
    }

    /// Every tile covering the viewport. A fractional zoom is covered at
    /// both neighbouring integer levels.
    pub fn tiles(&self) -> BTreeSet<TileCoord> {
        zoom_levels(self.zoom, self.zoom)
            .flat_map(|z| tiles_in_bounds(&self.bounds, z))
            .collect()
    }
}

/// Parses `"west,south,east,north@zoom"`.
impl FromStr for Viewport {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (bbox, zoom) = s.rsplit_once('@').ok_or_else(|| {
            TileError::InvalidRequest(format!("expected 'west,south,east,north@zoom', got '{}'", s))
        })?;
        let bounds =
            BoundingBox::parse(bbox).map_err(|e| TileError::InvalidRequest(e.to_string()))?;
        let zoom: f64 = zoom
            .trim()
            .parse()
            .map_err(|_| TileError::InvalidRequest(format!("invalid zoom '{}'", zoom)))?;
        Ok(Self { bounds, zoom })
    }
}

/// Tuning for plan generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Tiles of margin around each sampled point
    pub buffer_radius: u32,
    /// Path segments; a pan samples `path_steps + 1` points
    pub path_steps: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            buffer_radius: 4,
            path_steps: 50,
        }
    }
}

/// Zoom levels a simple zoom cue starts out from its target.
pub const SIMPLE_ZOOM_OUT: f64 = 2.0;

/// An animation the operator can cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnimationPlan {
    /// Fly from one point to another at a fixed zoom.
    PointToPoint {
        from: LatLng,
        to: LatLng,
        zoom: f64,
        /// Overrides `PlannerConfig::path_steps`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        steps: Option<u32>,
    },
    /// Zoom in or out around a fixed centre.
    Zoom {
        center: LatLng,
        from_zoom: f64,
        to_zoom: f64,
    },
}

impl AnimationPlan {
    /// Zoom into `level` from a couple of levels further out. The level is
    /// the map's current zoom and may be fractional.
    pub fn simple_zoom(center: LatLng, level: f64) -> Self {
        AnimationPlan::Zoom {
            center,
            from_zoom: (level - SIMPLE_ZOOM_OUT).max(0.0),
            to_zoom: level,
        }
    }

    /// Tiles needed to play this animation without blank tiles.
    pub fn tiles(&self, viewport: Option<&Viewport>, config: &PlannerConfig) -> BTreeSet<TileCoord> {
        match self {
            AnimationPlan::PointToPoint {
                from,
                to,
                zoom,
                steps,
            } => plan_point_to_point(
                *from,
                *to,
                *zoom,
                steps.unwrap_or(config.path_steps),
                viewport,
                config,
            ),
            AnimationPlan::Zoom {
                center,
                from_zoom,
                to_zoom,
            } => plan_zoom(*center, *from_zoom, *to_zoom, viewport, config),
        }
    }
}

/// Sample `steps + 1` evenly spaced points from `from` to `to`.
pub fn interpolate_path(from: LatLng, to: LatLng, steps: u32) -> Vec<LatLng> {
    if steps == 0 {
        return vec![from];
    }
    (0..=steps)
        .map(|i| from.lerp(&to, i as f64 / steps as f64))
        .collect()
}

/// Tiles for a pan: a buffered square around every sampled path point,
/// plus the current viewport.
pub fn plan_point_to_point(
    from: LatLng,
    to: LatLng,
    zoom: f64,
    steps: u32,
    viewport: Option<&Viewport>,
    config: &PlannerConfig,
) -> BTreeSet<TileCoord> {
    let mut tiles = BTreeSet::new();

    for point in interpolate_path(from, to, steps) {
        for z in zoom_levels(zoom, zoom) {
            tiles.extend(tiles_around_point(
                point.lat,
                point.lng,
                z,
                config.buffer_radius,
            ));
        }
    }

    if let Some(viewport) = viewport {
        tiles.extend(viewport.tiles());
    }
    tiles
}

/// Tiles for a zoom: a buffered square around the centre at every integer
/// level the zoom passes through, plus the current viewport.
pub fn plan_zoom(
    center: LatLng,
    from_zoom: f64,
    to_zoom: f64,
    viewport: Option<&Viewport>,
    config: &PlannerConfig,
) -> BTreeSet<TileCoord> {
    let mut tiles = BTreeSet::new();

    for z in zoom_levels(from_zoom, to_zoom) {
        tiles.extend(tiles_around_point(
            center.lat,
            center.lng,
            z,
            config.buffer_radius,
        ));
    }

    if let Some(viewport) = viewport {
        tiles.extend(viewport.tiles());
    }
    tiles
}
