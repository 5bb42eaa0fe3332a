//! Tile diagnostics: where a point's tile lives and whether it is cached.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use precache::LatLng;
use tile_common::tile::tile_to_latlon_bounds;
use tile_common::{latlon_to_tile, BoundingBox, SourceRegistry, TileCoord};
use tile_store::TileStore;

/// How many cached neighbours to list.
const SAMPLE_SIZE: usize = 9;

#[derive(Debug, Serialize)]
pub struct Diagnosis {
    pub point: LatLng,
    pub source: String,
    pub tile: TileCoord,
    pub bounds: BoundingBox,
    pub path: PathBuf,
    pub cached: bool,
    pub upstream_url: String,
    pub cached_sample: Vec<TileCoord>,
}

pub async fn diagnose(
    store: &TileStore,
    sources: &SourceRegistry,
    source: &str,
    point: LatLng,
    zoom: u32,
) -> Result<Diagnosis> {
    let tile_source = sources
        .get(source)
        .with_context(|| format!("Unknown tile source '{}' (known: {:?})", source, sources.keys()))?;

    let tile = latlon_to_tile(point.lat, point.lng, zoom);

    Ok(Diagnosis {
        point,
        source: source.to_string(),
        tile,
        bounds: tile_to_latlon_bounds(&tile),
        path: store.path_for(source, &tile),
        cached: store.has(source, &tile).await,
        upstream_url: tile_source.tile_url(&tile, 0),
        cached_sample: store.list_cached(source, tile.z, SAMPLE_SIZE).await?,
    })
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Point:        {}", self.point)?;
        writeln!(f, "Tile:         {}", self.tile)?;
        writeln!(
            f,
            "Tile bounds:  W {:.4} S {:.4} E {:.4} N {:.4}",
            self.bounds.west(),
            self.bounds.south(),
            self.bounds.east(),
            self.bounds.north()
        )?;
        writeln!(f, "Cache path:   {}", self.path.display())?;
        writeln!(f, "Cached:       {}", if self.cached { "yes" } else { "no" })?;
        writeln!(f, "Upstream URL: {}", self.upstream_url)?;

        if self.cached_sample.is_empty() {
            writeln!(f, "No {} tiles cached at zoom {}", self.source, self.tile.z)
        } else {
            writeln!(f, "Cached {} tiles at zoom {}:", self.source, self.tile.z)?;
            for tile in &self.cached_sample {
                writeln!(f, "  {}", tile)?;
            }
            Ok(())
        }
    }
}
