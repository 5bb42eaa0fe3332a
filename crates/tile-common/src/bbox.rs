//! Geographic bounding boxes (viewport extents).

use serde::{Deserialize, Serialize};

/// A geographic bounding box in degrees.
///
/// `min_x`/`max_x` are west/east longitudes, `min_y`/`max_y` are
/// south/north latitudes. A box whose west edge lies east of its east edge
/// spans the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Create a bounding box from map edges, the way a map view reports them.
    pub fn from_edges(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self::new(west, south, east, north)
    }

    /// Parse a bbox string: "west,south,east,north"
    pub fn parse(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let mut values = [0.0f64; 4];
        for (value, part) in values.iter_mut().zip(&parts) {
            *value = part
                .parse()
                .map_err(|_| BboxParseError::InvalidNumber(part.to_string()))?;
        }

        Ok(Self::new(values[0], values[1], values[2], values[3]))
    }

    pub fn north(&self) -> f64 {
        self.max_y
    }

    pub fn south(&self) -> f64 {
        self.min_y
    }

    pub fn east(&self) -> f64 {
        self.max_x
    }

    pub fn west(&self) -> f64 {
        self.min_x
    }

    /// Width of the bounding box in degrees of longitude.
    pub fn width(&self) -> f64 {
        if self.crosses_antimeridian() {
            360.0 - (self.min_x - self.max_x)
        } else {
            self.max_x - self.min_x
        }
    }

    /// True when the box wraps across the 180° meridian.
    pub fn crosses_antimeridian(&self) -> bool {
        self.min_x > self.max_x
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        let in_lat = lat >= self.min_y && lat <= self.max_y;
        let in_lon = if self.crosses_antimeridian() {
            lon >= self.min_x || lon <= self.max_x
        } else {
            lon >= self.min_x && lon <= self.max_x
        };
        in_lat && in_lon
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid bbox format: {0}. Expected 'west,south,east,north'")]
    InvalidFormat(String),

    #[error("Invalid number in bbox: {0}")]
    InvalidNumber(String),
}
