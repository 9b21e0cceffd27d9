// SPDX-License-Identifier: AGPL-3.0-or-later
//! CLI configuration file
//!
//! ```toml
//! paths = ["/Photos/Family", "/Photos/Trips"]
//!
//! [server]
//! url = "https://cloud.example.com/remote.php/dav/files/alice"
//! username = "alice"
//! password = "..."
//!
//! [cache]
//! budget_bytes = 2147483648
//!
//! [crawl]
//! max_depth = 32
//! concurrency = 4
//! ```

use pfk_cache::{ByteStoreConfig, MediaCacheConfig, MemoryCacheConfig, DEFAULT_BUDGET_BYTES};
use pfk_core::{PfkError, PfkResult};
use pfk_media::MediaLibraryConfig;
use pfk_providers::{CrawlerConfig, WebDavConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote folders to sync. Must stay ahead of the tables so it
    /// serializes as a top-level key.
    pub paths: Vec<String>,
    pub server: ServerSection,
    pub cache: CacheSection,
    pub crawl: CrawlSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub url: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Defaults to the platform cache directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    pub budget_bytes: u64,
    pub memory_items: usize,
    pub memory_bytes: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        let memory = MemoryCacheConfig::default();
        Self {
            dir: None,
            budget_bytes: DEFAULT_BUDGET_BYTES,
            memory_items: memory.max_items,
            memory_bytes: memory.max_bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlSection {
    pub max_depth: usize,
    pub concurrency: usize,
}

impl Default for CrawlSection {
    fn default() -> Self {
        let defaults = CrawlerConfig::default();
        Self {
            max_depth: defaults.max_depth,
            concurrency: defaults.max_concurrency,
        }
    }
}

impl Config {
    /// `config.toml` in the platform config directory
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "pfk", "photo-frame-kiosk")
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("pfk.toml"))
    }

    /// Load from `path`; a missing file gives the defaults
    pub fn load(path: &Path) -> PfkResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        toml::from_str(&contents)
            .map_err(|e| PfkError::Other(format!("invalid config {}: {e}", path.display())))
    }

    /// Write to `path`, readable only by the owner since it holds the
    /// server password
    pub fn save(&self, path: &Path) -> PfkResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| PfkError::Other(format!("cannot serialize config: {e}")))?;
        std::fs::write(path, contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    pub fn webdav(&self) -> PfkResult<WebDavConfig> {
        if self.server.url.is_empty() {
            return Err(PfkError::Other(
                "no server configured; set [server] url in the config file".into(),
            ));
        }

        let mut config = WebDavConfig::new(
            self.server.url.clone(),
            self.server.username.clone(),
            self.server.password.clone(),
        );
        let timeout = Duration::from_secs(self.server.timeout_secs.max(1));
        config.request_timeout = timeout;
        config.read_timeout = timeout;
        Ok(config)
    }

    pub fn media_cache(&self) -> MediaCacheConfig {
        let store = match &self.cache.dir {
            Some(dir) => ByteStoreConfig { path: dir.clone() },
            None => ByteStoreConfig::default(),
        };

        MediaCacheConfig {
            store,
            budget_bytes: self.cache.budget_bytes,
            memory: MemoryCacheConfig {
                max_items: self.cache.memory_items,
                max_bytes: self.cache.memory_bytes,
            },
        }
    }

    pub fn library(&self) -> MediaLibraryConfig {
        MediaLibraryConfig {
            paths: self.paths.clone(),
            crawler: CrawlerConfig {
                max_concurrency: self.crawl.concurrency,
                max_depth: self.crawl.max_depth,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("none.toml")).unwrap();
        assert!(config.paths.is_empty());
        assert_eq!(config.cache.budget_bytes, DEFAULT_BUDGET_BYTES);
        assert_eq!(config.crawl.max_depth, 32);
        assert!(config.webdav().is_err());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
paths = ["/Photos"]

[server]
url = "https://nas.local:5006"
username = "alice"
password = "s3cret"

[cache]
budget_bytes = 1048576
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.paths, vec!["/Photos"]);
        assert_eq!(config.server.timeout_secs, 30);
        assert_eq!(config.media_cache().budget_bytes, 1_048_576);
        assert_eq!(config.library().crawler.max_concurrency, 4);

        let webdav = config.webdav().unwrap();
        assert_eq!(webdav.username, "alice");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.paths.push("/Photos".into());
        config.server.url = "https://nas.local".into();
        config.cache.dir = Some(dir.path().join("cache"));
        config.cache.budget_bytes = 500;
        config.save(&path).unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.paths, config.paths);
        assert_eq!(reloaded.cache.budget_bytes, 500);
        assert_eq!(reloaded.cache.dir, config.cache.dir);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "paths = 3").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
