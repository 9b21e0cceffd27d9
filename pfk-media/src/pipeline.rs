// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cache-aware media retrieval
//!
//! Images come back as bytes; videos come back as something a player can
//! open, preferably a local file.

use bytes::Bytes;
use pfk_cache::MediaCache;
use pfk_core::{MediaSource, PfkResult};
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::gate::RequestGate;

/// Where a video can be played from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayableLocation {
    /// Complete file in the disk cache
    Cached(PathBuf),
    /// Remote URL with credentials embedded, for direct streaming
    Direct(Url),
}

impl PlayableLocation {
    pub fn is_cached(&self) -> bool {
        matches!(self, PlayableLocation::Cached(_))
    }
}

/// Fetches media through the cache
#[derive(Clone)]
pub struct MediaFetchPipeline {
    source: Arc<dyn MediaSource>,
    cache: MediaCache,
}

impl MediaFetchPipeline {
    pub fn new(source: Arc<dyn MediaSource>, cache: MediaCache) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &MediaCache {
        &self.cache
    }

    /// Image bytes from memory, disk, or the network, in that order.
    ///
    /// A network fetch fills the memory tier immediately and the disk tier
    /// in the background.
    pub async fn fetch_image(&self, url: &Url) -> PfkResult<Bytes> {
        if let Some(bytes) = self.cache.get_image(url.as_str()).await {
            return Ok(bytes);
        }

        debug!(url = %url, "image cache miss, fetching");
        let bytes = self.source.fetch_bytes(url).await?;
        self.cache.put_image(url.as_str(), bytes.clone());
        Ok(bytes)
    }

    /// `fetch_image` on behalf of a display slot. Yields `None` when the
    /// slot has issued a newer request by the time this one completes.
    pub async fn fetch_image_for(&self, gate: &RequestGate, url: &Url) -> PfkResult<Option<Bytes>> {
        let id = gate.issue();
        let result = self.fetch_image(url).await;

        if !gate.is_current(id) {
            debug!(url = %url, "discarding stale image result");
            return Ok(None);
        }
        result.map(Some)
    }

    /// A playable location for a video.
    ///
    /// Cached files are used as-is. Otherwise the video is downloaded into
    /// the cache; if that fails the caller gets a direct streaming URL
    /// instead, so this only errors when neither is possible.
    pub async fn fetch_playable_location(&self, url: &Url) -> PfkResult<PlayableLocation> {
        if let Some(path) = self.cache.cached_file(url.as_str()).await {
            debug!(url = %url, "video cache hit");
            return Ok(PlayableLocation::Cached(path));
        }

        let staging = self.cache.staging_path();
        match self.download(url, &staging).await {
            Ok(path) => Ok(PlayableLocation::Cached(path)),
            Err(e) => {
                warn!(url = %url, error = %e, "video download failed, streaming directly");
                discard(&staging).await;
                Ok(PlayableLocation::Direct(self.source.direct_stream_url(url)?))
            }
        }
    }

    /// `fetch_playable_location` on behalf of a display slot. Yields `None`
    /// when the slot has moved on; a download that finishes anyway stays in
    /// the cache for next time.
    pub async fn fetch_playable_location_for(
        &self,
        gate: &RequestGate,
        url: &Url,
    ) -> PfkResult<Option<PlayableLocation>> {
        let id = gate.issue();
        let result = self.fetch_playable_location(url).await;

        if !gate.is_current(id) {
            debug!(url = %url, "discarding stale video result");
            return Ok(None);
        }
        result.map(Some)
    }

    async fn download(&self, url: &Url, staging: &Path) -> PfkResult<PathBuf> {
        let bytes = self.source.download_to(url, staging).await?;
        let path = self.cache.adopt_download(staging, url.as_str()).await?;
        info!(url = %url, bytes, "video cached");
        Ok(path)
    }
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove staged download"),
    }
}
