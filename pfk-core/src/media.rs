// SPDX-License-Identifier: AGPL-3.0-or-later
//! Media items consumed by the playback pipeline

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::path::extension;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "heif"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "avi", "mkv"];

/// Media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
    LivePhoto,
}

impl MediaKind {
    pub fn is_video(&self) -> bool {
        matches!(self, MediaKind::Video)
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::LivePhoto => write!(f, "live-photo"),
        }
    }
}

/// Where the bytes of an item come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    /// Platform photo-library asset identifier
    LocalAsset(String),
    /// Absolute fetch URL on a WebDAV server
    Remote(Url),
}

/// One playable item, remote or local
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifiedMediaItem {
    pub id: String,
    pub kind: MediaKind,
    pub source: SourceLocator,
    pub creation_date: Option<DateTime<Utc>>,
}

impl UnifiedMediaItem {
    /// Remote item; the id is the absolute URL string.
    pub fn remote(url: Url, kind: MediaKind, creation_date: Option<DateTime<Utc>>) -> Self {
        Self {
            id: url.to_string(),
            kind,
            source: SourceLocator::Remote(url),
            creation_date,
        }
    }

    pub fn local(asset_id: impl Into<String>, kind: MediaKind) -> Self {
        let asset_id = asset_id.into();
        Self {
            id: asset_id.clone(),
            kind,
            source: SourceLocator::LocalAsset(asset_id),
            creation_date: None,
        }
    }

    pub fn remote_url(&self) -> Option<&Url> {
        match &self.source {
            SourceLocator::Remote(url) => Some(url),
            SourceLocator::LocalAsset(_) => None,
        }
    }
}

/// Classify a remote file by content type, falling back to its extension.
///
/// Returns `None` for anything that is neither a known image nor a known
/// video; such files never enter the item list.
pub fn classify(content_type: &str, path: &str) -> Option<MediaKind> {
    let content_type = content_type.to_ascii_lowercase();
    if content_type.contains("image") {
        return Some(MediaKind::Image);
    }
    if content_type.contains("video") {
        return Some(MediaKind::Video);
    }

    let ext = extension(path)?.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_wins() {
        assert_eq!(classify("image/jpeg", "/a/clip.mp4"), Some(MediaKind::Image));
        assert_eq!(classify("video/quicktime", "/a/b"), Some(MediaKind::Video));
    }

    #[test]
    fn test_extension_fallback() {
        assert_eq!(classify("", "/a/IMG_0001.HEIC"), Some(MediaKind::Image));
        assert_eq!(
            classify("application/octet-stream", "/a/clip.mkv"),
            Some(MediaKind::Video)
        );
    }

    #[test]
    fn test_unknown_is_dropped() {
        assert_eq!(classify("text/plain", "/a/notes.txt"), None);
        assert_eq!(classify("", "/a/noext"), None);
        assert_eq!(classify("application/pdf", "/a/scan.pdf"), None);
    }

    #[test]
    fn test_classification_is_deterministic() {
        for _ in 0..3 {
            assert_eq!(classify("", "/x/y.mov"), Some(MediaKind::Video));
            assert_eq!(classify("", "/x/y.gif"), None);
        }
    }

    #[test]
    fn test_remote_item_id_is_url() {
        let url = Url::parse("https://nas.local/photos/a.jpg").unwrap();
        let item = UnifiedMediaItem::remote(url.clone(), MediaKind::Image, None);
        assert_eq!(item.id, "https://nas.local/photos/a.jpg");
        assert_eq!(item.remote_url(), Some(&url));
    }

    #[test]
    fn test_local_item() {
        let item = UnifiedMediaItem::local("ABC-123/L0/001", MediaKind::LivePhoto);
        assert!(item.remote_url().is_none());
        assert_eq!(item.id, "ABC-123/L0/001");
    }
}
