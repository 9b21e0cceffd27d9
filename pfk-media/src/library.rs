// SPDX-License-Identifier: AGPL-3.0-or-later
//! Remote media library facade
//!
//! One object per configured server. Frontends browse, sync and fetch
//! through it and never see the client, crawler or cache directly.

use bytes::Bytes;
use pfk_cache::{CacheEntryInfo, MediaCache, MediaCacheConfig};
use pfk_core::{Depth, DirectoryLister, PfkResult, RemoteResource, UnifiedMediaItem};
use pfk_providers::{Crawler, CrawlerConfig, WebDavClient, WebDavConfig};
use reqwest::Url;
use std::sync::Arc;
use tracing::info;

use crate::gate::RequestGate;
use crate::pipeline::{MediaFetchPipeline, PlayableLocation};

/// What to sync and how
#[derive(Debug, Clone, Default)]
pub struct MediaLibraryConfig {
    /// Remote folders included in a sync
    pub paths: Vec<String>,
    pub crawler: CrawlerConfig,
}

/// Remote media library
pub struct MediaLibrary {
    client: Arc<WebDavClient>,
    crawler: Crawler,
    pipeline: MediaFetchPipeline,
    paths: Vec<String>,
}

impl MediaLibrary {
    pub fn new(client: WebDavClient, cache: MediaCache, config: MediaLibraryConfig) -> Self {
        let client = Arc::new(client);
        Self {
            crawler: Crawler::new(client.clone(), config.crawler),
            pipeline: MediaFetchPipeline::new(client.clone(), cache),
            client,
            paths: config.paths,
        }
    }

    /// Build the client and open the cache
    pub async fn connect(
        server: WebDavConfig,
        cache: MediaCacheConfig,
        config: MediaLibraryConfig,
    ) -> PfkResult<Self> {
        let client = WebDavClient::new(server)?;
        let cache = MediaCache::new(cache).await?;
        Ok(Self::new(client, cache, config))
    }

    pub fn client(&self) -> &WebDavClient {
        &self.client
    }

    pub fn cache(&self) -> &MediaCache {
        self.pipeline.cache()
    }

    pub fn pipeline(&self) -> &MediaFetchPipeline {
        &self.pipeline
    }

    pub fn selected_paths(&self) -> &[String] {
        &self.paths
    }

    /// Immediate children of a folder; empty when it cannot be listed
    pub async fn list_folder(&self, path: &str) -> Vec<RemoteResource> {
        self.client.list_directory(path, Depth::One).await
    }

    /// Like `list_folder`, but reports why a listing failed
    pub async fn try_list_folder(&self, path: &str) -> PfkResult<Vec<RemoteResource>> {
        self.client.try_list_directory(path, Depth::One).await
    }

    pub async fn test_connection(&self) -> PfkResult<()> {
        self.client.test_connection().await
    }

    /// Crawl every selected folder
    pub async fn sync_selected(&self) -> Vec<UnifiedMediaItem> {
        let items = self.crawler.crawl_all(&self.paths).await;
        info!(paths = self.paths.len(), items = items.len(), "sync finished");
        items
    }

    pub async fn fetch_image(&self, url: &Url) -> PfkResult<Bytes> {
        self.pipeline.fetch_image(url).await
    }

    pub async fn fetch_playable_location(&self, url: &Url) -> PfkResult<PlayableLocation> {
        self.pipeline.fetch_playable_location(url).await
    }

    /// `fetch_image` for a display slot; `None` once the slot has moved on
    pub async fn fetch_image_for(&self, gate: &RequestGate, url: &Url) -> PfkResult<Option<Bytes>> {
        self.pipeline.fetch_image_for(gate, url).await
    }

    /// `fetch_playable_location` for a display slot; `None` once the slot has moved on
    pub async fn fetch_playable_location_for(
        &self,
        gate: &RequestGate,
        url: &Url,
    ) -> PfkResult<Option<PlayableLocation>> {
        self.pipeline.fetch_playable_location_for(gate, url).await
    }

    pub async fn current_cache_size_bytes(&self) -> PfkResult<u64> {
        Ok(self.cache().current_size().await?)
    }

    pub async fn clear_all_cache(&self) -> PfkResult<usize> {
        Ok(self.cache().clear_all().await?)
    }

    pub async fn delete_cache_entries(&self, urls: &[String]) -> PfkResult<usize> {
        Ok(self.cache().delete_entries(urls).await?)
    }

    /// Most recently used first
    pub async fn list_cached_items(&self, limit: usize) -> PfkResult<Vec<CacheEntryInfo>> {
        Ok(self.cache().list_entries(limit).await?)
    }

    /// Change the disk budget and trim to it right away
    pub async fn set_cache_budget(&self, bytes: u64) -> PfkResult<()> {
        self.cache().set_budget(bytes);
        self.cache().evict().await?;
        Ok(())
    }
}
