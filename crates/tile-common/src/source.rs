//! Upstream tile source definitions.
//!
//! A source maps a logical key (the first path segment of a proxy request)
//! to a provider URL template. Templates use `{z}`, `{x}`, `{y}` and an
//! optional `{s}` shard placeholder.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{TileCoord, TileError, TileResult, MAX_ZOOM};

/// How a provider orders the column/row values in its URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisOrder {
    /// `{x}` receives the column and `{y}` the row.
    #[default]
    Standard,
    /// `{x}` receives the row and `{y}` the column (ArcGIS REST
    /// `tile/{level}/{row}/{col}` paths).
    Swapped,
}

/// A named upstream imagery provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileSource {
    /// Logical key, e.g. "esri-satellite"
    pub key: String,
    /// URL template with `{z}`, `{x}`, `{y}` and optionally `{s}`
    pub url_template: String,
    #[serde(default)]
    pub axis_order: AxisOrder,
    /// Values substituted for `{s}`, picked per request
    #[serde(default)]
    pub shards: Vec<String>,
    /// Deepest zoom the provider serves
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u32,
}

fn default_max_zoom() -> u32 {
    22
}

impl TileSource {
    /// Esri World Imagery.
    pub fn esri_satellite() -> Self {
        Self {
            key: "esri-satellite".to_string(),
            url_template:
                "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{x}/{y}"
                    .to_string(),
            axis_order: AxisOrder::Swapped,
            shards: Vec::new(),
            max_zoom: 19,
        }
    }

    /// Google satellite layer, spread over the mt0-mt3 hosts.
    pub fn google_satellite() -> Self {
        Self {
            key: "google-satellite".to_string(),
            url_template: "https://mt{s}.google.com/vt/lyrs=s&x={x}&y={y}&z={z}".to_string(),
            axis_order: AxisOrder::Standard,
            shards: ["0", "1", "2", "3"].iter().map(|s| s.to_string()).collect(),
            max_zoom: 22,
        }
    }

    /// True when the template needs a shard token.
    pub fn is_sharded(&self) -> bool {
        self.url_template.contains("{s}")
    }

    /// True when the provider can serve this tile.
    pub fn supports(&self, coord: &TileCoord) -> bool {
        coord.is_valid() && coord.z <= self.max_zoom
    }

    /// Resolve the template for a tile.
    ///
    /// `shard_index` selects from `shards` (modulo its length) and is
    /// ignored for unsharded templates.
    pub fn tile_url(&self, coord: &TileCoord, shard_index: usize) -> String {
        let (first, second) = match self.axis_order {
            AxisOrder::Standard => (coord.x, coord.y),
            AxisOrder::Swapped => (coord.y, coord.x),
        };

        let mut url = self
            .url_template
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &first.to_string())
            .replace("{y}", &second.to_string());

        if let Some(shard) = self.shards.get(shard_index % self.shards.len().max(1)) {
            url = url.replace("{s}", shard);
        }

        url
    }

    /// Check the template and shard list are usable.
    pub fn validate(&self) -> TileResult<()> {
        if self.key.trim().is_empty() || self.key.contains('/') {
            return Err(TileError::Config(format!(
                "source key '{}' must be a non-empty path segment",
                self.key
            )));
        }

        for placeholder in ["{z}", "{x}", "{y}"] {
            if !self.url_template.contains(placeholder) {
                return Err(TileError::Config(format!(
                    "source '{}' template is missing {}",
                    self.key, placeholder
                )));
            }
        }

        if self.is_sharded() && self.shards.is_empty() {
            return Err(TileError::Config(format!(
                "source '{}' template uses {{s}} but no shards are configured",
                self.key
            )));
        }

        if self.max_zoom > MAX_ZOOM {
            return Err(TileError::Config(format!(
                "source '{}' max_zoom {} exceeds {}",
                self.key, self.max_zoom, MAX_ZOOM
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SourcesFile {
    sources: Vec<TileSource>,
}

/// The static table of configured sources, keyed by logical name.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<String, TileSource>,
}

impl SourceRegistry {
    /// Build a registry, rejecting invalid or duplicate sources.
    pub fn new(sources: impl IntoIterator<Item = TileSource>) -> TileResult<Self> {
        let mut map = HashMap::new();
        for source in sources {
            source.validate()?;
            if map.contains_key(&source.key) {
                return Err(TileError::Config(format!(
                    "duplicate source key '{}'",
                    source.key
                )));
            }
            map.insert(source.key.clone(), source);
        }
        Ok(Self { sources: map })
    }

    /// Parse a YAML document of the form `sources: [...]`.
    pub fn from_yaml(content: &str) -> TileResult<Self> {
        let file: SourcesFile = serde_yaml::from_str(content)?;
        Self::new(file.sources)
    }

    /// Load a YAML source table from disk.
    pub fn load(path: &Path) -> TileResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TileError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let registry = Self::from_yaml(&content)?;
        info!(
            path = %path.display(),
            sources = ?registry.keys(),
            "Loaded tile sources"
        );
        Ok(registry)
    }

    pub fn get(&self, key: &str) -> Option<&TileSource> {
        self.sources.get(key)
    }

    /// Source keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.sources.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl SourceRegistry {
    /// The built-in ESRI and Google satellite sources.
    pub fn builtin() -> Self {
        let mut sources = HashMap::new();
        for source in [TileSource::esri_satellite(), TileSource::google_satellite()] {
            sources.insert(source.key.clone(), source);
        }
        Self { sources }
    }
}
