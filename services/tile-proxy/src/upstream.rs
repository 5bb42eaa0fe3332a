//! Upstream tile fetching.

use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use tracing::{debug, instrument, warn};

use tile_common::{TileCoord, TileError, TileResult, TileSource};

use crate::config::ProxyConfig;
use crate::metrics::record_upstream_fetch;

/// Retrieves raw tile bytes from a provider.
///
/// One attempt per call; retries belong to the caller.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    async fn fetch(&self, source: &TileSource, coord: &TileCoord) -> TileResult<Bytes>;
}

/// [`TileFetcher`] over HTTP.
pub struct HttpTileFetcher {
    client: reqwest::Client,
}

impl HttpTileFetcher {
    pub fn new(config: &ProxyConfig) -> TileResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| TileError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    fn pick_shard(source: &TileSource) -> usize {
        if source.shards.len() > 1 {
            rand::thread_rng().gen_range(0..source.shards.len())
        } else {
            0
        }
    }
}

#[async_trait]
impl TileFetcher for HttpTileFetcher {
    #[instrument(skip(self, source), fields(source = %source.key, tile = %coord))]
    async fn fetch(&self, source: &TileSource, coord: &TileCoord) -> TileResult<Bytes> {
        let url = source.tile_url(coord, Self::pick_shard(source));
        let start = Instant::now();

        debug!(url = %url, "Fetching upstream tile");

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                record_upstream_fetch(&source.key, "transport", start.elapsed());
                warn!(url = %url, error = %e, "Upstream request failed");
                return Err(TileError::Transport(format!("{}: {}", url, e)));
            }
        };

        let status = response.status();
        record_upstream_fetch(&source.key, status.as_str(), start.elapsed());

        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Upstream returned error status");
            return Err(TileError::Upstream {
                status: status.as_u16(),
                url,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TileError::Transport(format!("{}: {}", url, e)))?;

        // An empty 2xx body is not a tile; never let it reach the store.
        if body.is_empty() {
            warn!(url = %url, "Upstream returned an empty body");
            return Err(TileError::Upstream {
                status: status.as_u16(),
                url,
            });
        }

        debug!(
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetched upstream tile"
        );
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_shard_in_range() {
        let source = TileSource::google_satellite();
        for _ in 0..100 {
            assert!(HttpTileFetcher::pick_shard(&source) < source.shards.len());
        }
        assert_eq!(HttpTileFetcher::pick_shard(&TileSource::esri_satellite()), 0);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_transport_error() {
        let config = ProxyConfig {
            upstream_timeout: std::time::Duration::from_secs(2),
            ..ProxyConfig::default()
        };
        let fetcher = HttpTileFetcher::new(&config).unwrap();

        // Grab a free port and release it so nothing is listening there
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let source = TileSource {
            key: "local".to_string(),
            url_template: format!("http://127.0.0.1:{}/{{z}}/{{x}}/{{y}}.png", port),
            axis_order: Default::default(),
            shards: Vec::new(),
            max_zoom: 22,
        };

        let result = fetcher.fetch(&source, &TileCoord::new(0, 0, 0)).await;
        assert!(matches!(result, Err(TileError::Transport(_))));
    }
}
