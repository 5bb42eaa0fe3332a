//! Batched, single-flight tile pre-caching through the proxy.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use tile_common::{TileCoord, TileError, TileResult};

use crate::client::ProxyClient;

/// Batching policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloadConfig {
    /// Tiles requested concurrently
    pub batch_size: usize,
    /// Pause between batches
    pub batch_delay: Duration,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_delay: Duration::from_millis(50),
        }
    }
}

/// Live progress of the running pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PreloadProgress {
    pub completed: usize,
    pub total: usize,
    pub cached: usize,
    pub failed: usize,
}

impl PreloadProgress {
    pub fn status_message(&self) -> String {
        format!("Caching tiles: {}/{}", self.completed, self.total)
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

/// Why a pass did no work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Another pass was already running on this preloader
    AlreadyRunning,
    /// The proxy did not answer the liveness probe
    ProxyUnavailable,
    /// The active map style does not read from the tile cache
    StyleNotCached,
}

/// Outcome of a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PreloadReport {
    pub total: usize,
    /// Tiles the proxy already had
    pub already_cached: usize,
    /// Tiles the proxy fetched during this pass
    pub fetched: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
}

impl PreloadReport {
    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    pub fn cached_count(&self) -> usize {
        self.already_cached + self.fetched
    }

    /// A pass succeeds when no tile failed. Skipped passes succeed too; the
    /// animation is never held back by pre-caching.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn status_message(&self) -> String {
        match self.skipped {
            Some(SkipReason::AlreadyRunning) => "Tile caching already in progress".to_string(),
            Some(SkipReason::ProxyUnavailable) => {
                "Tile cache unavailable, animation will load tiles live".to_string()
            }
            Some(SkipReason::StyleNotCached) => {
                "Pre-caching not needed for this map style".to_string()
            }
            None if self.failed == 0 => {
                format!("Animation ready! ({} tiles cached)", self.cached_count())
            }
            None => format!("Animation ready with {} failed tiles", self.failed),
        }
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: &PreloadReport) {
        self.total += other.total;
        self.already_cached += other.already_cached;
        self.fetched += other.fetched;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TileOutcome {
    AlreadyCached,
    Fetched,
    Failed,
}

/// Clears the in-flight flag when a pass ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Pushes tile sets through the proxy so they are on disk before an
/// animation plays.
///
/// One pass runs at a time per preloader; a call made while a pass is
/// running returns a skipped report straight away.
pub struct Preloader {
    client: Arc<dyn ProxyClient>,
    config: PreloadConfig,
    in_flight: AtomicBool,
    progress: watch::Sender<PreloadProgress>,
}

impl Preloader {
    pub fn new(client: Arc<dyn ProxyClient>, config: PreloadConfig) -> Self {
        let (progress, _) = watch::channel(PreloadProgress::default());
        Self {
            client,
            config,
            in_flight: AtomicBool::new(false),
            progress,
        }
    }

    /// Follow progress of the current and future passes.
    pub fn subscribe(&self) -> watch::Receiver<PreloadProgress> {
        self.progress.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Best-effort pass: an unreachable proxy skips the pass instead of
    /// failing it.
    pub async fn preload(&self, tiles: &BTreeSet<TileCoord>, source: &str) -> PreloadReport {
        match self.run(tiles, source).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Skipping pre-cache, animation will load tiles live");
                PreloadReport::skipped(SkipReason::ProxyUnavailable)
            }
        }
    }

    /// Like [`Preloader::preload`], but an unreachable proxy is an error.
    pub async fn preload_required(
        &self,
        tiles: &BTreeSet<TileCoord>,
        source: &str,
    ) -> TileResult<PreloadReport> {
        self.run(tiles, source).await
    }

    async fn run(&self, tiles: &BTreeSet<TileCoord>, source: &str) -> TileResult<PreloadReport> {
        // Taken before any I/O so a concurrent call makes no requests at all.
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("Pre-cache already running");
            return Ok(PreloadReport::skipped(SkipReason::AlreadyRunning));
        };

        self.client.probe(source).await.map_err(|e| match e {
            TileError::CacheServerUnavailable(_) => e,
            other => TileError::CacheServerUnavailable(other.to_string()),
        })?;

        Ok(self.cache_all(tiles, source).await)
    }

    async fn cache_all(&self, tiles: &BTreeSet<TileCoord>, source: &str) -> PreloadReport {
        let tiles: Vec<TileCoord> = tiles.iter().copied().collect();
        let start = Instant::now();
        let mut report = PreloadReport {
            total: tiles.len(),
            ..PreloadReport::default()
        };
        let mut progress = PreloadProgress {
            total: tiles.len(),
            ..PreloadProgress::default()
        };
        self.progress.send_replace(progress);

        info!(source = %source, tiles = tiles.len(), "Pre-caching animation tiles");

        let batch_size = self.config.batch_size.max(1);
        let batch_count = tiles.len().div_ceil(batch_size);

        for (index, batch) in tiles.chunks(batch_size).enumerate() {
            let outcomes = join_all(batch.iter().map(|coord| self.cache_tile(source, coord))).await;

            for outcome in outcomes {
                match outcome {
                    TileOutcome::AlreadyCached => report.already_cached += 1,
                    TileOutcome::Fetched => report.fetched += 1,
                    TileOutcome::Failed => report.failed += 1,
                }
            }

            progress.completed += batch.len();
            progress.cached = report.cached_count();
            progress.failed = report.failed;
            self.progress.send_replace(progress);

            if index + 1 < batch_count && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }

        info!(
            source = %source,
            total = report.total,
            already_cached = report.already_cached,
            fetched = report.fetched,
            failed = report.failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pre-cache complete"
        );
        report
    }

    /// HEAD first; GET only when the proxy does not have the tile.
    async fn cache_tile(&self, source: &str, coord: &TileCoord) -> TileOutcome {
        match self.client.head_tile(source, coord).await {
            Ok(status) if is_success(status) => return TileOutcome::AlreadyCached,
            Ok(_) => {}
            Err(e) => {
                warn!(tile = %coord, error = %e, "Cache probe failed");
                return TileOutcome::Failed;
            }
        }

        match self.client.get_tile(source, coord).await {
            Ok(status) if is_success(status) => TileOutcome::Fetched,
            Ok(status) => {
                warn!(tile = %coord, status, "Failed to cache tile");
                TileOutcome::Failed
            }
            Err(e) => {
                warn!(tile = %coord, error = %e, "Failed to cache tile");
                TileOutcome::Failed
            }
        }
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_messages() {
        let progress = PreloadProgress {
            completed: 15,
            total: 40,
            cached: 14,
            failed: 1,
        };
        assert_eq!(progress.status_message(), "Caching tiles: 15/40");

        let ok = PreloadReport {
            total: 12,
            already_cached: 4,
            fetched: 8,
            failed: 0,
            skipped: None,
        };
        assert_eq!(ok.status_message(), "Animation ready! (12 tiles cached)");

        let partial = PreloadReport {
            failed: 3,
            ..ok
        };
        assert_eq!(
            partial.status_message(),
            "Animation ready with 3 failed tiles"
        );
        assert!(!partial.is_success());
    }

    #[test]
    fn test_skipped_reports_succeed() {
        for reason in [
            SkipReason::AlreadyRunning,
            SkipReason::ProxyUnavailable,
            SkipReason::StyleNotCached,
        ] {
            let report = PreloadReport::skipped(reason);
            assert!(report.is_success());
            assert_eq!(report.total, 0);
        }
    }

    #[test]
    fn test_guard_is_exclusive_and_released() {
        let flag = AtomicBool::new(false);
        {
            let _guard = InFlightGuard::acquire(&flag).unwrap();
            assert!(InFlightGuard::acquire(&flag).is_none());
        }
        assert!(!flag.load(Ordering::Acquire));
        assert!(InFlightGuard::acquire(&flag).is_some());
    }

    #[test]
    fn test_merge_reports() {
        let mut total = PreloadReport::default();
        total.merge(&PreloadReport {
            total: 5,
            already_cached: 2,
            fetched: 3,
            failed: 0,
            skipped: None,
        });
        total.merge(&PreloadReport {
            total: 4,
            already_cached: 0,
            fetched: 3,
            failed: 1,
            skipped: None,
        });
        assert_eq!(total.total, 9);
        assert_eq!(total.cached_count(), 8);
        assert_eq!(total.failed, 1);
    }
}
