//! Prometheus counters for tile traffic.

use std::time::Duration;

use metrics::{counter, histogram};

/// How a tile request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileOutcome {
    /// GET served from the store
    Hit,
    /// GET fetched upstream and stored
    Miss,
    /// HEAD for a cached tile
    ProbeHit,
    /// HEAD for an uncached tile
    ProbeMiss,
    Error,
}

impl TileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TileOutcome::Hit => "hit",
            TileOutcome::Miss => "miss",
            TileOutcome::ProbeHit => "probe_hit",
            TileOutcome::ProbeMiss => "probe_miss",
            TileOutcome::Error => "error",
        }
    }
}

pub fn record_tile_request(source: &str, outcome: TileOutcome) {
    counter!(
        "tile_requests_total",
        "source" => source.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record one upstream round trip. `status` is the HTTP status code, or
/// `"transport"` when no response arrived.
pub fn record_upstream_fetch(source: &str, status: &str, elapsed: Duration) {
    counter!(
        "upstream_fetches_total",
        "source" => source.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("upstream_fetch_seconds", "source" => source.to_string())
        .record(elapsed.as_secs_f64());
}
