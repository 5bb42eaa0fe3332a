//! Cache warm-up for common broadcast areas.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use serde::Serialize;
use tracing::info;

use tile_common::{tiles_around_point, TileCoord, TileResult};

use crate::planner::LatLng;
use crate::preloader::{PreloadReport, Preloader};

/// Tiles of margin around each preset centre.
pub const WARM_RADIUS: u32 = 2;

/// A region the newsroom frames often enough to keep warm.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastArea {
    pub name: String,
    pub center: LatLng,
    pub zooms: RangeInclusive<u32>,
    pub radius: u32,
}

impl BroadcastArea {
    pub fn new(name: &str, center: LatLng, zooms: RangeInclusive<u32>) -> Self {
        Self {
            name: name.to_string(),
            center,
            zooms,
            radius: WARM_RADIUS,
        }
    }

    /// Built-in areas.
    pub fn presets() -> Vec<BroadcastArea> {
        vec![
            BroadcastArea::new("Europe", LatLng::new(54.5, 15.0), 0..=5),
            BroadcastArea::new("North America", LatLng::new(45.0, -100.0), 0..=5),
            BroadcastArea::new("Global", LatLng::new(0.0, 0.0), 0..=3),
        ]
    }

    /// Look up a preset, ignoring case and treating `-`/`_` as spaces.
    pub fn preset(name: &str) -> Option<BroadcastArea> {
        let wanted = normalize(name);
        Self::presets()
            .into_iter()
            .find(|area| normalize(&area.name) == wanted)
    }

    pub fn tiles(&self) -> BTreeSet<TileCoord> {
        self.zooms
            .clone()
            .flat_map(|z| tiles_around_point(self.center.lat, self.center.lng, z, self.radius))
            .collect()
    }
}

fn normalize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '-' | '_' => ' ',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Per-area results of a warm-up run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WarmReport {
    pub areas: Vec<(String, PreloadReport)>,
}

impl WarmReport {
    pub fn total(&self) -> PreloadReport {
        let mut total = PreloadReport::default();
        for (_, report) in &self.areas {
            total.merge(report);
        }
        total
    }
}

/// Warm each area in turn. Unlike a cue, an unreachable proxy is an error.
pub async fn warm_areas(
    preloader: &Preloader,
    areas: &[BroadcastArea],
    source: &str,
) -> TileResult<WarmReport> {
    let mut warm = WarmReport::default();

    for area in areas {
        let tiles = area.tiles();
        info!(
            area = %area.name,
            source = %source,
            zooms = ?area.zooms,
            tiles = tiles.len(),
            "Warming broadcast area"
        );

        let report = preloader.preload_required(&tiles, source).await?;
        warm.areas.push((area.name.clone(), report));
    }

    Ok(warm)
}
