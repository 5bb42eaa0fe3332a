//! Cache usage statistics.

use std::collections::BTreeMap;

use serde::Serialize;

/// Usage for a single source directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub tiles: u64,
    pub bytes: u64,
}

/// Usage across the cache, keyed by source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub sources: BTreeMap<String, SourceStats>,
}

impl StoreStats {
    pub(crate) fn record(&mut self, source: &str, bytes: u64) {
        let entry = self.sources.entry(source.to_string()).or_default();
        entry.tiles += 1;
        entry.bytes += bytes;
    }

    pub fn total_tiles(&self) -> u64 {
        self.sources.values().map(|s| s.tiles).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.sources.values().map(|s| s.bytes).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
