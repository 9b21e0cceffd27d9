// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory image tier
//!
//! Bounded by entry count and by total byte cost. Only an accelerator: the
//! disk store stays authoritative and anything here may vanish at any time.

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Memory tier limits
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    pub max_items: usize,
    pub max_bytes: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_items: 50,
            max_bytes: 50 * 1024 * 1024,
        }
    }
}

struct Inner {
    entries: LruCache<String, Bytes>,
    cost: u64,
}

pub struct MemoryCache {
    inner: Mutex<Inner>,
    max_bytes: u64,
}

impl MemoryCache {
    pub fn new(config: MemoryCacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_items).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                cost: 0,
            }),
            max_bytes: config.max_bytes,
        }
    }

    /// Look up and promote to most recently used
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Insert, evicting least recently used entries until both limits hold.
    /// Values larger than the whole byte limit are not kept.
    pub fn put(&self, key: impl Into<String>, value: Bytes) {
        let size = value.len() as u64;
        if size > self.max_bytes {
            return;
        }

        let mut inner = self.inner.lock();
        inner.cost += size;
        if let Some((_, displaced)) = inner.entries.push(key.into(), value) {
            // Either the previous value for this key or the LRU entry
            inner.cost -= displaced.len() as u64;
        }

        while inner.cost > self.max_bytes {
            match inner.entries.pop_lru() {
                Some((_, evicted)) => inner.cost -= evicted.len() as u64,
                None => break,
            }
        }
    }

    pub fn remove(&self, key: &str) -> Option<Bytes> {
        let mut inner = self.inner.lock();
        let removed = inner.entries.pop(key);
        if let Some(ref value) = removed {
            inner.cost -= value.len() as u64;
        }
        removed
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.cost = 0;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes held
    pub fn cost(&self) -> u64 {
        self.inner.lock().cost
    }
}
