//! Shared application state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use tile_common::{SourceRegistry, TileResult};
use tile_store::TileStore;

use crate::config::ProxyConfig;
use crate::upstream::{HttpTileFetcher, TileFetcher};

/// State shared by every request handler.
pub struct AppState {
    pub store: TileStore,
    pub sources: SourceRegistry,
    pub fetcher: Arc<dyn TileFetcher>,
    pub inflight: KeyedLocks,
}

impl AppState {
    /// Build state for a running proxy: filesystem store, configured
    /// sources and an HTTP fetcher.
    pub fn new(config: &ProxyConfig) -> TileResult<Self> {
        let sources = config.load_sources()?;
        let fetcher = HttpTileFetcher::new(config)?;
        Ok(Self::with_fetcher(
            TileStore::new(&config.cache_dir),
            sources,
            Arc::new(fetcher),
        ))
    }

    pub fn with_fetcher(
        store: TileStore,
        sources: SourceRegistry,
        fetcher: Arc<dyn TileFetcher>,
    ) -> Self {
        Self {
            store,
            sources,
            fetcher,
            inflight: KeyedLocks::default(),
        }
    }
}

/// One async mutex per cache key, created on demand and dropped once no
/// request holds or waits on it.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, LockEntry>>,
}

#[derive(Default)]
struct LockEntry {
    mutex: Arc<AsyncMutex<()>>,
    /// Holder plus waiters
    users: usize,
}

impl KeyedLocks {
    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: &str) -> KeyGuard<'_> {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            let entry = locks.entry(key.to_string()).or_default();
            entry.users += 1;
            Arc::clone(&entry.mutex)
        };

        // Registered before waiting so a cancelled wait still releases the entry.
        let mut key_guard = KeyGuard {
            owner: self,
            key: key.to_string(),
            guard: None,
        };
        key_guard.guard = Some(mutex.lock_owned().await);
        key_guard
    }

    /// Keys with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct KeyGuard<'a> {
    owner: &'a KeyedLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();

        let mut locks = self.owner.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = locks.get_mut(&self.key) {
            entry.users -= 1;
            if entry.users == 0 {
                locks.remove(&self.key);
            }
        }
    }
}
