//! The pre-caching client driven against a live proxy over TCP.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;
use tokio::net::TcpListener;

use precache::{HttpProxyClient, PreloadConfig, Preloader, ProxyClient};
use test_utils::{files_under, temp_cache_dir, tile_payload};
use tile_common::{SourceRegistry, TileCoord, TileError, TileResult, TileSource};
use tile_proxy::{build_router, AppState, TileFetcher};
use tile_store::TileStore;

const SOURCE: &str = "esri-satellite";

/// Upstream that serves every tile except one.
struct FlakyFetcher {
    broken: TileCoord,
    calls: AtomicUsize,
}

impl FlakyFetcher {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TileFetcher for FlakyFetcher {
    async fn fetch(&self, source: &TileSource, coord: &TileCoord) -> TileResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *coord == self.broken {
            return Err(TileError::Upstream {
                status: 503,
                url: source.tile_url(coord, 0),
            });
        }
        Ok(Bytes::from(tile_payload(coord.z, coord.x, coord.y)))
    }
}

async fn spawn_proxy(fetcher: Arc<FlakyFetcher>) -> (SocketAddr, TempDir) {
    let cache = temp_cache_dir();
    let state = AppState::with_fetcher(
        TileStore::new(cache.path()),
        SourceRegistry::builtin(),
        fetcher,
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(Arc::new(state));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, cache)
}

fn client_for(addr: SocketAddr) -> Arc<HttpProxyClient> {
    Arc::new(HttpProxyClient::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap())
}

/// The 3x3 block of z3 tiles starting at the origin.
fn z3_block() -> BTreeSet<TileCoord> {
    (0..3)
        .flat_map(|x| (0..3).map(move |y| TileCoord::new(3, x, y)))
        .collect()
}

#[tokio::test]
async fn test_client_against_live_proxy() {
    let fetcher = Arc::new(FlakyFetcher {
        broken: TileCoord::new(3, 1, 1),
        calls: AtomicUsize::new(0),
    });
    let (addr, _cache) = spawn_proxy(fetcher.clone()).await;
    let client = client_for(addr);
    let coord = TileCoord::new(3, 2, 2);

    client.probe(SOURCE).await.unwrap();
    assert_eq!(client.head_tile(SOURCE, &coord).await.unwrap(), 404);
    assert_eq!(fetcher.calls(), 0);

    assert_eq!(client.get_tile(SOURCE, &coord).await.unwrap(), 200);
    assert_eq!(client.head_tile(SOURCE, &coord).await.unwrap(), 200);
    assert_eq!(fetcher.calls(), 1);

    assert_eq!(
        client.get_tile(SOURCE, &TileCoord::new(3, 1, 1)).await.unwrap(),
        500
    );
    assert_eq!(
        client.get_tile("bing-aerial", &coord).await.unwrap(),
        404
    );
}

#[tokio::test]
async fn test_preload_twice_through_live_proxy() {
    let fetcher = Arc::new(FlakyFetcher {
        broken: TileCoord::new(3, 1, 1),
        calls: AtomicUsize::new(0),
    });
    let (addr, cache) = spawn_proxy(fetcher.clone()).await;
    let config = PreloadConfig {
        batch_size: 5,
        batch_delay: Duration::from_millis(1),
    };
    let preloader = Preloader::new(client_for(addr), config);
    let tiles = z3_block();

    let first = preloader.preload(&tiles, SOURCE).await;
    assert_eq!(first.skipped, None);
    assert_eq!(first.total, 9);
    assert_eq!(first.fetched, 8);
    assert_eq!(first.already_cached, 0);
    assert_eq!(first.failed, 1);
    assert_eq!(fetcher.calls(), 9);
    assert_eq!(files_under(cache.path()).len(), 8);

    // Cached tiles only get a HEAD; the broken one is retried upstream
    let second = preloader.preload(&tiles, SOURCE).await;
    assert_eq!(second.already_cached, 8);
    assert_eq!(second.fetched, 0);
    assert_eq!(second.failed, 1);
    assert_eq!(fetcher.calls(), 10);
    assert!(!preloader.is_running());
}
