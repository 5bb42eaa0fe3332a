//! Operator session: what the map shows and how a cue is pre-cached.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use tile_common::{TileCoord, TileError};

use crate::planner::{AnimationPlan, PlannerConfig, Viewport};
use crate::preloader::{PreloadReport, Preloader, SkipReason};
use crate::DEFAULT_SOURCE;

/// Base map styles the operator can pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MapStyle {
    Positron,
    Snazzy,
    Google,
    Satellite,
    EsriSatellite,
    /// Satellite imagery served through the local tile cache
    CachedSatellite,
}

impl MapStyle {
    pub const ALL: [MapStyle; 6] = [
        MapStyle::Positron,
        MapStyle::Snazzy,
        MapStyle::Google,
        MapStyle::Satellite,
        MapStyle::EsriSatellite,
        MapStyle::CachedSatellite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MapStyle::Positron => "positron",
            MapStyle::Snazzy => "snazzy",
            MapStyle::Google => "google",
            MapStyle::Satellite => "satellite",
            MapStyle::EsriSatellite => "esri-satellite",
            MapStyle::CachedSatellite => "cached-satellite",
        }
    }

    /// True when the style reads its tiles from the proxy.
    pub fn is_caching_aware(&self) -> bool {
        matches!(self, MapStyle::CachedSatellite)
    }
}

impl fmt::Display for MapStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapStyle {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MapStyle::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TileError::Config(format!("unknown map style '{}'", s)))
    }
}

/// The operator's current map state, passed explicitly to each cue.
#[derive(Debug, Clone)]
pub struct CueSession {
    pub style: MapStyle,
    /// Tile source key the cached style reads from
    pub source: String,
    pub viewport: Option<Viewport>,
    pub planner: PlannerConfig,
}

impl Default for CueSession {
    fn default() -> Self {
        Self {
            style: MapStyle::CachedSatellite,
            source: DEFAULT_SOURCE.to_string(),
            viewport: None,
            planner: PlannerConfig::default(),
        }
    }
}

impl CueSession {
    pub fn new(style: MapStyle, source: impl Into<String>) -> Self {
        Self {
            style,
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn with_planner(mut self, planner: PlannerConfig) -> Self {
        self.planner = planner;
        self
    }

    /// Tiles the animation needs from this session's point of view.
    pub fn plan(&self, plan: &AnimationPlan) -> BTreeSet<TileCoord> {
        plan.tiles(self.viewport.as_ref(), &self.planner)
    }

    /// Pre-cache an animation. Styles that do not read from the cache skip
    /// straight to success.
    pub async fn cue(&self, preloader: &Preloader, plan: &AnimationPlan) -> PreloadReport {
        if !self.style.is_caching_aware() {
            info!(style = %self.style, "Style does not use the tile cache, skipping pre-cache");
            return PreloadReport::skipped(SkipReason::StyleNotCached);
        }

        let tiles = self.plan(plan);
        preloader.preload(&tiles, &self.source).await
    }
}
