// SPDX-License-Identifier: AGPL-3.0-or-later
//! Media cache for Photo Frame Kiosk
//!
//! Two tiers: a bounded in-memory image cache in front of a flat disk store.
//! The disk store is kept under a byte budget by an LRU pass that runs in
//! the background after every write that can grow it.

pub mod byte_store;
pub mod error;
pub mod key;
pub mod memory;
pub mod policy;

pub use byte_store::{ByteStore, ByteStoreConfig, STALE_STAGING_AGE};
pub use error::{CacheError, CacheResult};
pub use key::CacheKey;
pub use memory::{MemoryCache, MemoryCacheConfig};
pub use policy::{plan_eviction, CacheEntryInfo, EvictionPlan, EvictionReport};

use bytes::Bytes;
use parking_lot::Mutex;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Default disk budget: 2 GiB
pub const DEFAULT_BUDGET_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Media cache configuration
#[derive(Debug, Clone)]
pub struct MediaCacheConfig {
    pub store: ByteStoreConfig,
    pub budget_bytes: u64,
    pub memory: MemoryCacheConfig,
}

impl Default for MediaCacheConfig {
    fn default() -> Self {
        Self {
            store: ByteStoreConfig::default(),
            budget_bytes: DEFAULT_BUDGET_BYTES,
            memory: MemoryCacheConfig::default(),
        }
    }
}

/// Memory + disk cache for fetched media.
///
/// Cheap to clone; clones share the same tiers, budget and background
/// work. Background disk writes and eviction passes are tracked, and
/// `flush` waits for them.
#[derive(Clone)]
pub struct MediaCache {
    store: Arc<ByteStore>,
    memory: Arc<MemoryCache>,
    budget: Arc<AtomicU64>,
    pending: Arc<Mutex<JoinSet<()>>>,
}

impl MediaCache {
    /// Open the cache and trim anything over budget left by an earlier
    /// process
    pub async fn new(config: MediaCacheConfig) -> CacheResult<Self> {
        let store = ByteStore::new(config.store).await?;
        let cache = Self {
            store: Arc::new(store),
            memory: Arc::new(MemoryCache::new(config.memory)),
            budget: Arc::new(AtomicU64::new(config.budget_bytes)),
            pending: Arc::new(Mutex::new(JoinSet::new())),
        };

        if let Err(e) = cache.evict().await {
            warn!(error = %e, "initial cache eviction failed");
        }
        Ok(cache)
    }

    pub fn store(&self) -> &ByteStore {
        &self.store
    }

    pub fn memory(&self) -> &MemoryCache {
        &self.memory
    }

    pub fn budget(&self) -> u64 {
        self.budget.load(Ordering::Relaxed)
    }

    /// Takes effect from the next eviction pass
    pub fn set_budget(&self, bytes: u64) {
        self.budget.store(bytes, Ordering::Relaxed);
    }

    pub fn key_for(url: &str) -> CacheKey {
        CacheKey::from_url(url)
    }

    /// Cached image bytes: memory first, then disk. A disk hit is touched
    /// and promoted into memory.
    pub async fn get_image(&self, url: &str) -> Option<Bytes> {
        if let Some(bytes) = self.memory.get(url) {
            debug!(url, "memory cache hit");
            return Some(bytes);
        }

        let key = Self::key_for(url);
        match self.store.read(&key).await {
            Ok(Some(bytes)) => {
                if let Err(e) = self.store.touch(&key).await {
                    warn!(key = %key, error = %e, "failed to touch cache entry");
                }
                self.memory.put(url, bytes.clone());
                debug!(url, "disk cache hit");
                Some(bytes)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(url, error = %e, "failed to read cache entry");
                None
            }
        }
    }

    /// Put image bytes in memory now and on disk in the background.
    ///
    /// Disk failures are logged and swallowed; the memory tier still serves
    /// the image.
    pub fn put_image(&self, url: &str, bytes: Bytes) {
        self.memory.put(url, bytes.clone());

        let cache = self.clone();
        let url = url.to_string();
        self.spawn_tracked(async move {
            if let Err(e) = cache.store_bytes(&url, &bytes).await {
                warn!(url = %url, error = %e, "failed to write image to disk cache");
            }
        });
    }

    /// Write raw bytes to disk under the URL's key, then schedule eviction
    pub async fn store_bytes(&self, url: &str, bytes: &[u8]) -> CacheResult<PathBuf> {
        let path = self.store.write(bytes, &Self::key_for(url)).await?;
        self.schedule_eviction();
        Ok(path)
    }

    /// Path of a cached file, touched; `None` on a miss
    pub async fn cached_file(&self, url: &str) -> Option<PathBuf> {
        let key = Self::key_for(url);
        match self.store.touch(&key).await {
            Ok(true) => Some(self.store.path_for(&key)),
            Ok(false) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "failed to touch cache entry");
                None
            }
        }
    }

    /// Where a streaming download should be written before `adopt_download`
    pub fn staging_path(&self) -> PathBuf {
        self.store.staging_path()
    }

    /// Move a completed download into the cache and schedule eviction
    pub async fn adopt_download(&self, temp: &Path, url: &str) -> CacheResult<PathBuf> {
        let path = self.store.move_in(temp, &Self::key_for(url)).await?;
        self.schedule_eviction();
        Ok(path)
    }

    /// Total bytes on disk, from a fresh scan
    pub async fn current_size(&self) -> CacheResult<u64> {
        self.store.total_size().await
    }

    pub async fn clear_all(&self) -> CacheResult<usize> {
        self.memory.clear();
        let removed = self.store.delete_all().await?;
        info!(removed, "cleared media cache");
        Ok(removed)
    }

    /// Delete the entries for `urls`; returns how many disk entries went
    pub async fn delete_entries(&self, urls: &[String]) -> CacheResult<usize> {
        for url in urls {
            self.memory.remove(url);
        }
        let keys: Vec<CacheKey> = urls.iter().map(|u| Self::key_for(u)).collect();
        self.store.delete(&keys).await
    }

    /// Cached entries, most recently used first
    pub async fn list_entries(&self, limit: usize) -> CacheResult<Vec<CacheEntryInfo>> {
        let mut entries = self.store.enumerate().await?;
        entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.key.cmp(&b.key)));
        entries.truncate(limit);
        Ok(entries)
    }

    /// Run an eviction pass in the background
    pub fn schedule_eviction(&self) {
        let cache = self.clone();
        self.spawn_tracked(async move {
            if let Err(e) = cache.evict().await {
                warn!(error = %e, "cache eviction failed");
            }
        });
    }

    /// Wait for every background write and eviction pass, including the
    /// passes scheduled by those writes. Call before shutting the runtime
    /// down.
    pub async fn flush(&self) {
        loop {
            let mut tasks = std::mem::take(&mut *self.pending.lock());
            if tasks.is_empty() {
                return;
            }
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "background cache task failed");
                }
            }
        }
    }

    fn spawn_tracked<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending.lock();
        // Reap finished tasks so a long-running process does not accumulate them
        while let Some(result) = pending.try_join_next() {
            if let Err(e) = result {
                warn!(error = %e, "background cache task failed");
            }
        }
        pending.spawn(task);
    }

    /// One eviction pass from a fresh enumeration, holding the store's
    /// write lock from enumeration to the last delete.
    pub async fn evict(&self) -> CacheResult<EvictionReport> {
        let budget = self.budget();
        if let Err(e) = self.store.sweep_staging(Some(STALE_STAGING_AGE)).await {
            warn!(error = %e, "failed to sweep staging directory");
        }
        let store = self.store.exclusive().await;

        let entries = store.enumerate().await?;
        let size_before: u64 = entries.iter().map(|e| e.size).sum();
        let plan = plan_eviction(&entries, size_before, budget);

        let mut report = EvictionReport {
            size_before,
            size_after: size_before,
            ..Default::default()
        };

        if plan.is_empty() {
            debug!(size_bytes = size_before, budget_bytes = budget, "cache within budget");
            return Ok(report);
        }

        info!(
            size_bytes = size_before,
            budget_bytes = budget,
            target_bytes = plan.target,
            candidates = plan.evict.len(),
            "cache over budget, evicting"
        );

        for entry in &plan.evict {
            match store.remove(&entry.key).await {
                Ok(true) => {
                    report.files_deleted += 1;
                    report.bytes_freed += entry.size;
                }
                Ok(false) => {}
                Err(e) => {
                    report.failures += 1;
                    warn!(key = %entry.key, error = %e, "failed to evict cache entry");
                }
            }
        }

        report.size_after = size_before.saturating_sub(report.bytes_freed);
        info!(
            files_deleted = report.files_deleted,
            bytes_freed = report.bytes_freed,
            size_after = report.size_after,
            failures = report.failures,
            "eviction complete"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::{Duration, SystemTime};

    async fn cache_in(dir: &tempfile::TempDir, budget: u64) -> MediaCache {
        MediaCache::new(MediaCacheConfig {
            store: ByteStoreConfig {
                path: dir.path().join("media"),
            },
            budget_bytes: budget,
            memory: MemoryCacheConfig::default(),
        })
        .await
        .unwrap()
    }

    fn url(i: usize) -> String {
        format!("https://nas.local/photos/{i}.jpg")
    }

    /// Write `count` entries of `size` bytes with strictly increasing mtimes
    async fn fill(cache: &MediaCache, count: usize, size: usize) {
        let base = SystemTime::now() - Duration::from_secs(10_000);
        for i in 1..=count {
            let key = MediaCache::key_for(&url(i));
            cache.store().write(&vec![b'x'; size], &key).await.unwrap();
            cache
                .store()
                .touch_at(&key, base + Duration::from_secs(i as u64 * 10))
                .await
                .unwrap();
        }
    }

    async fn surviving(cache: &MediaCache) -> HashSet<String> {
        cache
            .store()
            .enumerate()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.key.to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_budget_of_1000_with_five_300_byte_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir, 1000).await;
        fill(&cache, 5, 300).await;

        let report = cache.evict().await.unwrap();
        assert_eq!(report.size_before, 1500);
        assert_eq!(report.files_deleted, 2);
        assert_eq!(report.size_after, 900);

        let expected: HashSet<String> = (3..=5)
            .map(|i| MediaCache::key_for(&url(i)).to_string())
            .collect();
        assert_eq!(surviving(&cache).await, expected);
        assert_eq!(cache.current_size().await.unwrap(), 900);
    }

    #[tokio::test]
    async fn test_read_protects_entry_from_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir, 1000).await;
        fill(&cache, 4, 300).await;

        // Reading the oldest entry makes it the most recent
        assert!(cache.get_image(&url(1)).await.is_some());

        cache.evict().await.unwrap();
        let left = surviving(&cache).await;
        assert!(left.contains(MediaCache::key_for(&url(1)).as_str()));
        assert!(!left.contains(MediaCache::key_for(&url(2)).as_str()));
    }

    #[tokio::test]
    async fn test_eviction_within_budget_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir, 1000).await;
        fill(&cache, 3, 300).await;

        let report = cache.evict().await.unwrap();
        assert_eq!(report.files_deleted, 0);
        assert_eq!(surviving(&cache).await.len(), 3);
    }

    #[tokio::test]
    async fn test_background_eviction_settles_under_target() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir, 1000).await;

        for i in 0..10 {
            cache.store_bytes(&url(i), &[0u8; 250]).await.unwrap();
        }

        let mut size = u64::MAX;
        for _ in 0..100 {
            // Any still-running pass finishes before this one takes the lock
            cache.evict().await.unwrap();
            size = cache.current_size().await.unwrap();
            if size <= 900 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(size <= 900, "cache settled at {size} bytes");
    }

    #[tokio::test]
    async fn test_put_image_serves_from_memory_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir, DEFAULT_BUDGET_BYTES).await;
        let u = url(1);

        cache.put_image(&u, Bytes::from_static(b"jpeg"));
        cache.flush().await;
        assert_eq!(cache.memory().get(&u).unwrap(), &b"jpeg"[..]);
        assert!(cache.store().exists(&MediaCache::key_for(&u)).await);

        cache.memory().clear();
        assert_eq!(cache.get_image(&u).await.unwrap(), &b"jpeg"[..]);
        // Promoted back into memory
        assert!(cache.memory().get(&u).is_some());
    }

    #[tokio::test]
    async fn test_adopt_download_and_cached_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir, DEFAULT_BUDGET_BYTES).await;
        let u = "https://nas.local/videos/clip.mp4";

        assert!(cache.cached_file(u).await.is_none());

        let temp = cache.staging_path();
        tokio::fs::write(&temp, b"moov").await.unwrap();
        let path = cache.adopt_download(&temp, u).await.unwrap();

        assert_eq!(cache.cached_file(u).await, Some(path.clone()));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"moov");
    }

    #[tokio::test]
    async fn test_delete_entries_and_clear_all() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir, DEFAULT_BUDGET_BYTES).await;
        fill(&cache, 3, 10).await;

        let removed = cache
            .delete_entries(&[url(1), "https://nas.local/never-cached.jpg".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);

        assert_eq!(cache.clear_all().await.unwrap(), 2);
        assert_eq!(cache.current_size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_entries_most_recent_first() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir, DEFAULT_BUDGET_BYTES).await;
        fill(&cache, 4, 10).await;

        let listed = cache.list_entries(2).await.unwrap();
        let keys: Vec<String> = listed.iter().map(|e| e.key.to_string()).collect();
        assert_eq!(
            keys,
            vec![
                MediaCache::key_for(&url(4)).to_string(),
                MediaCache::key_for(&url(3)).to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_set_budget_applies_to_next_pass() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir, DEFAULT_BUDGET_BYTES).await;
        fill(&cache, 5, 100).await;

        assert_eq!(cache.evict().await.unwrap().files_deleted, 0);
        cache.set_budget(200);
        cache.evict().await.unwrap();
        assert!(cache.current_size().await.unwrap() <= 180);
    }

    #[tokio::test]
    async fn test_flush_waits_for_scheduled_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(&dir, 1000).await;

        for i in 0..10 {
            let temp = cache.staging_path();
            tokio::fs::write(&temp, [0u8; 300]).await.unwrap();
            cache.adopt_download(&temp, &url(i)).await.unwrap();
        }
        cache.flush().await;

        assert!(cache.current_size().await.unwrap() <= 1000);
    }

    #[test]
    fn test_budget_holds_across_short_lived_runtimes() {
        let dir = tempfile::tempdir().unwrap();

        // Each runtime stands in for one CLI invocation
        for i in 0..10 {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let cache = cache_in(&dir, 1000).await;
                let temp = cache.staging_path();
                tokio::fs::write(&temp, [0u8; 300]).await.unwrap();
                cache.adopt_download(&temp, &url(i)).await.unwrap();
                cache.flush().await;
            });
        }

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let size = runtime.block_on(async { cache_in(&dir, 1000).await.current_size().await.unwrap() });
        assert!(size <= 1000, "cache grew to {size} bytes");
    }

    #[tokio::test]
    async fn test_open_trims_overflow_from_earlier_runs() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = cache_in(&dir, DEFAULT_BUDGET_BYTES).await;
            fill(&cache, 5, 300).await;
        }

        let cache = cache_in(&dir, 1000).await;
        assert_eq!(cache.current_size().await.unwrap(), 900);
    }
}
