//! HTTP access to the tile proxy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;

use tile_common::{TileCoord, TileError, TileResult};

/// The calls the preloader makes against the tile proxy.
#[async_trait]
pub trait ProxyClient: Send + Sync {
    /// Succeeds when the proxy answers at all, whatever the status.
    async fn probe(&self, source: &str) -> TileResult<()>;

    /// Status of a `HEAD` for the tile.
    async fn head_tile(&self, source: &str, coord: &TileCoord) -> TileResult<u16>;

    /// Status of a `GET` for the tile, after the body has been drained.
    async fn get_tile(&self, source: &str, coord: &TileCoord) -> TileResult<u16>;
}

/// [`ProxyClient`] over HTTP.
pub struct HttpProxyClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProxyClient {
    pub fn new(base_url: &str, timeout: Duration) -> TileResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TileError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tile_url(&self, source: &str, coord: &TileCoord) -> String {
        format!("{}/{}/{}.png", self.base_url, source, coord)
    }

    async fn status_of(&self, method: Method, url: &str) -> TileResult<u16> {
        let response = self
            .client
            .request(method, url)
            .send()
            .await
            .map_err(|e| TileError::Transport(format!("{}: {}", url, e)))?;
        Ok(response.status().as_u16())
    }
}

#[async_trait]
impl ProxyClient for HttpProxyClient {
    async fn probe(&self, source: &str) -> TileResult<()> {
        let root = format!("{}/", self.base_url);
        match self.status_of(Method::OPTIONS, &root).await {
            Ok(status) => {
                debug!(status, "Tile proxy answered OPTIONS probe");
                return Ok(());
            }
            Err(e) => debug!(error = %e, "OPTIONS probe failed, trying HEAD"),
        }

        let fallback = self.tile_url(source, &TileCoord::new(0, 0, 0));
        match self.status_of(Method::HEAD, &fallback).await {
            Ok(status) => {
                debug!(status, "Tile proxy answered HEAD probe");
                Ok(())
            }
            Err(e) => Err(TileError::CacheServerUnavailable(format!(
                "{}: {}",
                self.base_url, e
            ))),
        }
    }

    async fn head_tile(&self, source: &str, coord: &TileCoord) -> TileResult<u16> {
        self.status_of(Method::HEAD, &self.tile_url(source, coord))
            .await
    }

    async fn get_tile(&self, source: &str, coord: &TileCoord) -> TileResult<u16> {
        let url = self.tile_url(source, coord);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TileError::Transport(format!("{}: {}", url, e)))?;

        let status = response.status().as_u16();
        response
            .bytes()
            .await
            .map_err(|e| TileError::Transport(format!("{}: {}", url, e)))?;
        Ok(status)
    }
}
