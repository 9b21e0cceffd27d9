// SPDX-License-Identifier: AGPL-3.0-or-later
//! Flat on-disk byte store
//!
//! One file per cache key in a single directory. Every file in the root is a
//! complete download: new content is written under `.staging/` first and
//! renamed into place. The file's mtime is the recency signal used by
//! eviction, so reads stamp it as well as writes.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::key::CacheKey;
use crate::policy::CacheEntryInfo;
use crate::CacheResult;

const STAGING_DIR: &str = ".staging";

/// Staged files untouched for this long belong to a dead download
pub const STALE_STAGING_AGE: Duration = Duration::from_secs(60 * 60);

/// Byte store configuration
#[derive(Debug, Clone)]
pub struct ByteStoreConfig {
    /// Directory holding the cache entries
    pub path: PathBuf,
}

impl Default for ByteStoreConfig {
    fn default() -> Self {
        let cache_dir = directories::ProjectDirs::from("com", "pfk", "photo-frame-kiosk")
            .map(|d| d.cache_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("/tmp/pfk-cache"));

        Self {
            path: cache_dir.join("media"),
        }
    }
}

/// Disk store for cached media
pub struct ByteStore {
    root: PathBuf,
    staging: PathBuf,
    /// Serializes every mutation of the root directory
    write_lock: Mutex<()>,
    staging_counter: AtomicU64,
}

impl ByteStore {
    /// Open (creating if needed) a store rooted at `config.path`.
    ///
    /// Anything left in the staging directory is from an interrupted
    /// download of an earlier process and is removed.
    pub async fn new(config: ByteStoreConfig) -> CacheResult<Self> {
        let staging = config.path.join(STAGING_DIR);
        fs::create_dir_all(&staging).await?;

        let store = Self {
            root: config.path,
            staging,
            write_lock: Mutex::new(()),
            staging_counter: AtomicU64::new(0),
        };

        let swept = store.sweep_staging(None).await?;
        if swept > 0 {
            info!(files = swept, "removed interrupted downloads from staging");
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    pub async fn exists(&self, key: &CacheKey) -> bool {
        fs::try_exists(self.path_for(key)).await.unwrap_or(false)
    }

    /// A fresh path inside the staging directory. Staged files live on the
    /// same filesystem as the root, so `move_in` is a plain rename.
    pub fn staging_path(&self) -> PathBuf {
        let seq = self.staging_counter.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        self.staging
            .join(format!("{:x}-{:x}-{}.part", nanos, seq, std::process::id()))
    }

    /// Atomically replace the entry at `key` with the file at `temp`, then
    /// stamp it as just used.
    pub async fn move_in(&self, temp: &Path, key: &CacheKey) -> CacheResult<PathBuf> {
        let dest = self.path_for(key);
        let _guard = self.write_lock.lock().await;

        fs::rename(temp, &dest).await?;
        set_mtime(dest.clone(), SystemTime::now()).await?;

        debug!(key = %key, "moved entry into cache");
        Ok(dest)
    }

    /// Store `data` under `key` (staged, then moved in)
    pub async fn write(&self, data: &[u8], key: &CacheKey) -> CacheResult<PathBuf> {
        let temp = self.staging_path();

        let staged = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(data).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = staged {
            discard_staged(&temp).await;
            return Err(e.into());
        }

        match self.move_in(&temp, key).await {
            Ok(path) => Ok(path),
            Err(e) => {
                discard_staged(&temp).await;
                Err(e)
            }
        }
    }

    /// Read an entry; `None` when it is not cached
    pub async fn read(&self, key: &CacheKey) -> CacheResult<Option<Bytes>> {
        match fs::read(self.path_for(key)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Mark an entry as used now. Returns `false` when it is not cached.
    pub async fn touch(&self, key: &CacheKey) -> CacheResult<bool> {
        self.touch_at(key, SystemTime::now()).await
    }

    /// Set an entry's recency stamp to `when`
    pub async fn touch_at(&self, key: &CacheKey, when: SystemTime) -> CacheResult<bool> {
        let _guard = self.write_lock.lock().await;
        match set_mtime(self.path_for(key), when).await {
            Ok(()) => Ok(true),
            Err(crate::CacheError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Full scan of the cached entries
    pub async fn enumerate(&self) -> CacheResult<Vec<CacheEntryInfo>> {
        scan(&self.root).await
    }

    /// Sum of entry sizes, from a fresh scan
    pub async fn total_size(&self) -> CacheResult<u64> {
        Ok(self.enumerate().await?.iter().map(|e| e.size).sum())
    }

    /// Delete the given entries; returns how many were actually removed
    pub async fn delete(&self, keys: &[CacheKey]) -> CacheResult<usize> {
        let guard = self.exclusive().await;
        let mut removed = 0;
        for key in keys {
            if guard.remove(key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Delete every cached entry along with stale staged files. Staged
    /// downloads still being written are left alone.
    pub async fn delete_all(&self) -> CacheResult<usize> {
        let guard = self.exclusive().await;
        let mut removed = 0;
        for entry in guard.enumerate().await? {
            match guard.remove(&entry.key).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(key = %entry.key, error = %e, "failed to delete cache entry"),
            }
        }
        drop(guard);

        self.sweep_staging(Some(STALE_STAGING_AGE)).await?;
        Ok(removed)
    }

    /// Remove staged files last modified more than `older_than` ago, or all
    /// of them when `None`. Returns how many were removed.
    pub async fn sweep_staging(&self, older_than: Option<Duration>) -> CacheResult<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        let mut dir = fs::read_dir(&self.staging).await?;

        while let Some(item) = dir.next_entry().await? {
            let Ok(meta) = item.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }

            let stale = match older_than {
                None => true,
                Some(age) => meta
                    .modified()
                    .ok()
                    .and_then(|m| now.duration_since(m).ok())
                    .is_some_and(|idle| idle > age),
            };
            if !stale {
                continue;
            }

            match fs::remove_file(item.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %item.path().display(), error = %e, "failed to remove staged file"),
            }
        }

        if removed > 0 {
            debug!(files = removed, "swept staging directory");
        }
        Ok(removed)
    }

    /// Hold the write lock across several operations (enumerate-then-delete)
    pub async fn exclusive(&self) -> ExclusiveStore<'_> {
        ExclusiveStore {
            store: self,
            _guard: self.write_lock.lock().await,
        }
    }
}

/// Store access with the write lock held
pub struct ExclusiveStore<'a> {
    store: &'a ByteStore,
    _guard: MutexGuard<'a, ()>,
}

impl ExclusiveStore<'_> {
    pub async fn enumerate(&self) -> CacheResult<Vec<CacheEntryInfo>> {
        scan(&self.store.root).await
    }

    /// Remove one entry; `false` if it was already gone
    pub async fn remove(&self, key: &CacheKey) -> CacheResult<bool> {
        match fs::remove_file(self.store.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

async fn scan(root: &Path) -> CacheResult<Vec<CacheEntryInfo>> {
    let mut entries = Vec::new();
    let mut dir = fs::read_dir(root).await?;

    while let Some(item) = dir.next_entry().await? {
        let name = item.file_name().to_string_lossy().to_string();
        let Ok(key) = CacheKey::from_file_name(&name) else {
            continue;
        };

        // Entries can vanish between read_dir and stat
        let Ok(meta) = item.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }

        let modified: DateTime<Utc> = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| DateTime::<Utc>::from(SystemTime::UNIX_EPOCH));

        entries.push(CacheEntryInfo {
            key,
            size: meta.len(),
            modified,
        });
    }

    Ok(entries)
}

async fn set_mtime(path: PathBuf, when: SystemTime) -> CacheResult<()> {
    tokio::task::spawn_blocking(move || {
        let file = std::fs::OpenOptions::new().write(true).open(&path)?;
        file.set_modified(when)
    })
    .await??;
    Ok(())
}

async fn discard_staged(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove staged file");
        }
    }
}
