//! Planner and preloader behaviour against a mock proxy.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use precache::planner::plan_point_to_point;
use precache::{
    warm_areas, AnimationPlan, BroadcastArea, CueSession, LatLng, MapStyle, PlannerConfig,
    PreloadConfig, Preloader, ProxyClient, SkipReason,
};
use test_utils::{points, tiles as known_tiles};
use tile_common::{BoundingBox, TileCoord, TileError, TileResult};

/// In-memory stand-in for the tile proxy.
#[derive(Default)]
struct MockProxy {
    calls: AtomicUsize,
    down: bool,
    delay: Option<Duration>,
    cached: Mutex<HashSet<TileCoord>>,
    broken: HashSet<TileCoord>,
}

impl MockProxy {
    fn with_cached(tiles: impl IntoIterator<Item = TileCoord>) -> Self {
        Self {
            cached: Mutex::new(tiles.into_iter().collect()),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn is_cached(&self, coord: &TileCoord) -> bool {
        self.cached.lock().unwrap().contains(coord)
    }

    async fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ProxyClient for MockProxy {
    async fn probe(&self, _source: &str) -> TileResult<()> {
        self.hit().await;
        if self.down {
            Err(TileError::CacheServerUnavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }

    async fn head_tile(&self, _source: &str, coord: &TileCoord) -> TileResult<u16> {
        self.hit().await;
        Ok(if self.is_cached(coord) { 200 } else { 404 })
    }

    async fn get_tile(&self, _source: &str, coord: &TileCoord) -> TileResult<u16> {
        self.hit().await;
        if self.broken.contains(coord) {
            return Ok(500);
        }
        self.cached.lock().unwrap().insert(*coord);
        Ok(200)
    }
}

fn fast_config() -> PreloadConfig {
    PreloadConfig {
        batch_size: 5,
        batch_delay: Duration::ZERO,
    }
}

fn square(z: u32, from: u32, to: u32) -> BTreeSet<TileCoord> {
    let mut tiles = BTreeSet::new();
    for x in from..=to {
        for y in from..=to {
            tiles.insert(TileCoord::new(z, x, y));
        }
    }
    tiles
}

#[test]
fn test_london_to_paris_plan_is_bounded_and_valid() {
    let config = PlannerConfig::default();
    let steps = 50;
    let (london, paris) = (points::LONDON, points::PARIS);
    let planned = plan_point_to_point(
        LatLng::new(london.0, london.1),
        LatLng::new(paris.0, paris.1),
        6.0,
        steps,
        None,
        &config,
    );

    let side = (2 * config.buffer_radius + 1) as usize;
    assert!(!planned.is_empty());
    assert!(planned.len() <= (steps as usize + 1) * side * side);
    assert!(planned.iter().all(|t| t.z == 6 && t.x < 64 && t.y < 64));

    // Both endpoints are covered
    for (z, x, y) in [known_tiles::LONDON_Z6, known_tiles::PARIS_Z6] {
        assert!(planned.contains(&TileCoord::new(z, x, y)));
    }
}

#[test]
fn test_plan_includes_current_viewport() {
    let session = CueSession::default().with_viewport(
        "100,-40,120,-20@4"
            .parse()
            .expect("viewport literal parses"),
    );
    let plan = AnimationPlan::PointToPoint {
        from: LatLng::new(51.5, -0.1),
        to: LatLng::new(48.85, 2.35),
        zoom: 6.0,
        steps: None,
    };

    let tiles = session.plan(&plan);
    let viewport = BoundingBox::new(100.0, -40.0, 120.0, -20.0);
    assert!(tiles
        .iter()
        .any(|t| t.z == 4 && tile_common::tiles_in_bounds(&viewport, 4).contains(t)));
}

#[tokio::test]
async fn test_preload_counts_cached_and_fetched() {
    let tiles = square(4, 0, 3);
    let already: Vec<TileCoord> = tiles.iter().copied().take(6).collect();
    let proxy = Arc::new(MockProxy::with_cached(already));
    let preloader = Preloader::new(proxy.clone(), fast_config());

    let report = preloader.preload(&tiles, "esri-satellite").await;

    assert_eq!(report.total, 16);
    assert_eq!(report.already_cached, 6);
    assert_eq!(report.fetched, 10);
    assert_eq!(report.failed, 0);
    assert!(report.is_success());
    assert_eq!(report.skipped, None);
    assert_eq!(report.status_message(), "Animation ready! (16 tiles cached)");

    // 1 probe, 16 HEADs, 10 GETs
    assert_eq!(proxy.calls(), 1 + 16 + 10);
    assert!(tiles.iter().all(|t| proxy.is_cached(t)));
}

#[tokio::test]
async fn test_one_failing_tile_does_not_abort() {
    let tiles = square(5, 10, 12);
    let bad = TileCoord::new(5, 11, 11);
    let proxy = Arc::new(MockProxy {
        broken: HashSet::from([bad]),
        ..MockProxy::default()
    });
    let preloader = Preloader::new(proxy.clone(), fast_config());

    let report = preloader.preload(&tiles, "esri-satellite").await;

    assert_eq!(report.total, 9);
    assert_eq!(report.failed, 1);
    assert_eq!(report.cached_count(), 8);
    assert!(!report.is_success());
    assert_eq!(report.status_message(), "Animation ready with 1 failed tiles");

    for tile in &tiles {
        assert_eq!(proxy.is_cached(tile), *tile != bad, "{}", tile);
    }
}

#[tokio::test]
async fn test_concurrent_preload_is_single_flight() {
    let tiles = square(3, 0, 3);
    let proxy = Arc::new(MockProxy {
        delay: Some(Duration::from_millis(5)),
        ..MockProxy::default()
    });
    let preloader = Preloader::new(proxy.clone(), fast_config());

    let (first, second) = tokio::join!(
        preloader.preload(&tiles, "esri-satellite"),
        preloader.preload(&tiles, "esri-satellite"),
    );

    let (ran, skipped) = if first.skipped.is_none() {
        (first, second)
    } else {
        (second, first)
    };

    assert_eq!(skipped.skipped, Some(SkipReason::AlreadyRunning));
    assert!(skipped.is_success());
    assert_eq!(skipped.total, 0);

    assert_eq!(ran.fetched, 16);
    // Only the running pass touched the proxy
    assert_eq!(proxy.calls(), 1 + 16 + 16);
    assert!(!preloader.is_running());
}

#[tokio::test]
async fn test_guard_released_after_pass() {
    let tiles = square(2, 0, 1);
    let proxy = Arc::new(MockProxy::default());
    let preloader = Preloader::new(proxy.clone(), fast_config());

    let first = preloader.preload(&tiles, "esri-satellite").await;
    let second = preloader.preload(&tiles, "esri-satellite").await;

    assert_eq!(first.fetched, 4);
    assert_eq!(second.skipped, None);
    assert_eq!(second.already_cached, 4);
}

#[tokio::test]
async fn test_unavailable_proxy_skips_with_success() {
    let proxy = Arc::new(MockProxy {
        down: true,
        ..MockProxy::default()
    });
    let preloader = Preloader::new(proxy.clone(), fast_config());

    let report = preloader.preload(&square(3, 0, 1), "esri-satellite").await;

    assert_eq!(report.skipped, Some(SkipReason::ProxyUnavailable));
    assert!(report.is_success());
    // Only the probe was attempted
    assert_eq!(proxy.calls(), 1);
    assert!(!preloader.is_running());
}

#[tokio::test]
async fn test_progress_is_published() {
    let tiles = square(4, 0, 3);
    let proxy = Arc::new(MockProxy::default());
    let preloader = Preloader::new(proxy, fast_config());
    let progress = preloader.subscribe();

    let report = preloader.preload(&tiles, "esri-satellite").await;

    let last = *progress.borrow();
    assert_eq!(last.total, 16);
    assert_eq!(last.completed, 16);
    assert_eq!(last.cached, report.cached_count());
    assert_eq!(last.failed, 0);
    assert!(last.is_done());
    assert_eq!(last.status_message(), "Caching tiles: 16/16");
}

#[tokio::test]
async fn test_non_cached_style_skips_without_calls() {
    let proxy = Arc::new(MockProxy::default());
    let preloader = Preloader::new(proxy.clone(), fast_config());
    let session = CueSession::new(MapStyle::Positron, "esri-satellite");

    let report = session
        .cue(&preloader, &AnimationPlan::simple_zoom(LatLng::new(0.0, 0.0), 5.0))
        .await;

    assert_eq!(report.skipped, Some(SkipReason::StyleNotCached));
    assert!(report.is_success());
    assert_eq!(proxy.calls(), 0);
}

#[tokio::test]
async fn test_cached_style_cue_preloads_plan() {
    let proxy = Arc::new(MockProxy::default());
    let preloader = Preloader::new(proxy.clone(), fast_config());
    let session = CueSession::new(MapStyle::CachedSatellite, "esri-satellite").with_planner(
        PlannerConfig {
            buffer_radius: 1,
            path_steps: 10,
        },
    );
    let plan = AnimationPlan::simple_zoom(LatLng::new(10.0, 10.0), 6.0);

    let report = session.cue(&preloader, &plan).await;

    assert_eq!(report.total, session.plan(&plan).len());
    assert_eq!(report.fetched, report.total);
    // Levels 4 through 6, 3x3 each
    assert_eq!(report.total, 27);
}

#[tokio::test]
async fn test_warm_areas_aggregates() {
    let proxy = Arc::new(MockProxy::default());
    let preloader = Preloader::new(proxy, fast_config());
    let areas = vec![
        BroadcastArea::preset("global").unwrap(),
        BroadcastArea::preset("europe").unwrap(),
    ];

    let warm = warm_areas(&preloader, &areas, "esri-satellite").await.unwrap();

    assert_eq!(warm.areas.len(), 2);
    assert_eq!(warm.areas[0].0, "Global");
    assert_eq!(warm.areas[0].1.total, areas[0].tiles().len());
    let total = warm.total();
    assert_eq!(total.total, areas[0].tiles().len() + areas[1].tiles().len());
    assert!(total.is_success());
}

#[tokio::test]
async fn test_warm_areas_requires_proxy() {
    let proxy = Arc::new(MockProxy {
        down: true,
        ..MockProxy::default()
    });
    let preloader = Preloader::new(proxy, fast_config());

    let result = warm_areas(&preloader, &BroadcastArea::presets(), "esri-satellite").await;
    assert!(matches!(result, Err(TileError::CacheServerUnavailable(_))));
}
