//! Filesystem-backed tile store.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

use tile_common::{TileCoord, TileError, TileResult};

use crate::stats::StoreStats;

const TILE_EXTENSION: &str = "png";

/// Tile cache rooted at a directory.
///
/// Cloning is cheap; clones share the same root.
#[derive(Debug, Clone)]
pub struct TileStore {
    root: PathBuf,
}

impl TileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic on-disk path for a tile.
    pub fn path_for(&self, source: &str, coord: &TileCoord) -> PathBuf {
        self.root
            .join(source)
            .join(coord.z.to_string())
            .join(coord.x.to_string())
            .join(format!("{}.{}", coord.y, TILE_EXTENSION))
    }

    /// True when a tile file exists. I/O errors count as absent.
    pub async fn has(&self, source: &str, coord: &TileCoord) -> bool {
        fs::try_exists(self.path_for(source, coord))
            .await
            .unwrap_or(false)
    }

    /// Read a cached tile.
    pub async fn read(&self, source: &str, coord: &TileCoord) -> TileResult<Bytes> {
        let path = self.path_for(source, coord);
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(TileError::NotFound(
                format!("{}/{}", source, coord),
            )),
            Err(e) => Err(TileError::Storage(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Persist a tile, creating parent directories as needed.
    ///
    /// Bytes land in a uniquely named sibling first and are renamed into
    /// place, so readers see either the old file, the new file, or nothing.
    /// Rewriting an existing tile replaces it.
    pub async fn write(&self, source: &str, coord: &TileCoord, data: &[u8]) -> TileResult<()> {
        let final_path = self.path_for(source, coord);
        let dir = final_path
            .parent()
            .ok_or_else(|| TileError::Storage(format!("no parent for {}", final_path.display())))?;

        fs::create_dir_all(dir).await.map_err(|e| {
            TileError::Storage(format!("failed to create {}: {}", dir.display(), e))
        })?;

        let temp_path = dir.join(format!(
            "{}.{}.tmp-{}",
            coord.y,
            TILE_EXTENSION,
            uuid::Uuid::new_v4()
        ));

        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(TileError::Storage(format!(
                "failed to write {}: {}",
                temp_path.display(),
                e
            )));
        }

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(TileError::Storage(format!(
                "failed to move tile into {}: {}",
                final_path.display(),
                e
            )));
        }

        debug!(
            source = %source,
            tile = %coord,
            bytes = data.len(),
            "Stored tile"
        );
        Ok(())
    }

    /// Tile counts and sizes per source, optionally for a single source.
    pub async fn stats(&self, source: Option<&str>) -> TileResult<StoreStats> {
        let root = match source {
            Some(source) => self.root.join(source),
            None => self.root.clone(),
        };
        let only = source.map(str::to_string);

        tokio::task::spawn_blocking(move || collect_stats(&root, only.as_deref()))
            .await
            .map_err(|e| TileError::Storage(format!("stats task failed: {}", e)))
    }

    /// Up to `limit` cached tiles of `source` at zoom `z`, sorted.
    pub async fn list_cached(
        &self,
        source: &str,
        z: u32,
        limit: usize,
    ) -> TileResult<Vec<TileCoord>> {
        let zoom_dir = self.root.join(source).join(z.to_string());

        tokio::task::spawn_blocking(move || {
            let mut tiles: Vec<TileCoord> = WalkDir::new(&zoom_dir)
                .min_depth(2)
                .max_depth(2)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_file())
                .filter_map(|entry| parse_tile_entry(z, entry.path()))
                .collect();
            tiles.sort();
            tiles.truncate(limit);
            tiles
        })
        .await
        .map_err(|e| TileError::Storage(format!("listing task failed: {}", e)))
    }
}

/// Recover a coordinate from `{x}/{y}.png` below a zoom directory.
fn parse_tile_entry(z: u32, path: &Path) -> Option<TileCoord> {
    if path.extension()?.to_str()? != TILE_EXTENSION {
        return None;
    }
    let y: u32 = path.file_stem()?.to_str()?.parse().ok()?;
    let x: u32 = path.parent()?.file_name()?.to_str()?.parse().ok()?;
    TileCoord::checked(z, x, y)
}

fn collect_stats(root: &Path, only: Option<&str>) -> StoreStats {
    let mut stats = StoreStats::default();

    // With a single source the walk starts inside that source directory.
    let depth = if only.is_some() { 3 } else { 4 };

    for entry in WalkDir::new(root)
        .min_depth(depth)
        .max_depth(depth)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(TILE_EXTENSION) {
            continue;
        }

        let source = match only {
            Some(source) => source.to_string(),
            None => match path
                .strip_prefix(root)
                .ok()
                .and_then(|rel| rel.components().next())
                .and_then(|c| c.as_os_str().to_str())
            {
                Some(source) => source.to_string(),
                None => continue,
            },
        };

        let bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
        stats.record(&source, bytes);
    }

    stats
}
