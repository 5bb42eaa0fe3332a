//! Proxy configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tile_common::{SourceRegistry, TileResult};

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8001";
pub const DEFAULT_USER_AGENT: &str = concat!("tilecue-proxy/", env!("CARGO_PKG_VERSION"));

/// Runtime settings for the proxy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address the tile surface binds to
    pub listen: SocketAddr,
    /// Cache root directory
    pub cache_dir: PathBuf,
    /// Optional YAML source table; built-in sources otherwise
    pub sources_file: Option<PathBuf>,
    /// Per-request upstream timeout
    pub upstream_timeout: Duration,
    /// User agent sent upstream
    pub user_agent: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8001)),
            cache_dir: PathBuf::from("./tile-cache"),
            sources_file: None,
            upstream_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ProxyConfig {
    /// Resolve the source table for this configuration.
    pub fn load_sources(&self) -> TileResult<SourceRegistry> {
        match &self.sources_file {
            Some(path) => SourceRegistry::load(path),
            None => Ok(SourceRegistry::builtin()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.listen.to_string(), DEFAULT_LISTEN);
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("tilecue-proxy/"));
    }

    #[test]
    fn test_builtin_sources_without_file() {
        let registry = ProxyConfig::default().load_sources().unwrap();
        assert!(registry.get("esri-satellite").is_some());
        assert!(registry.get("google-satellite").is_some());
    }
}
