// SPDX-License-Identifier: AGPL-3.0-or-later
//! Remote resources returned by a WebDAV listing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::path::normalize_path;

/// One `<response>` entry from a PROPFIND multistatus body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteResource {
    /// Raw href as sent by the server (may be a URL, absolute or relative path)
    pub href: String,
    /// Empty when the server omitted `getcontenttype`
    pub content_type: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub is_collection: bool,
    pub content_length: Option<u64>,
    pub etag: Option<String>,
}

impl RemoteResource {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            ..Default::default()
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn collection(mut self) -> Self {
        self.is_collection = true;
        self
    }

    /// Directory if any of: explicit collection marker, a directory-ish
    /// content type, or a trailing slash on the href.
    pub fn is_directory(&self) -> bool {
        let content_type = self.content_type.to_ascii_lowercase();
        self.is_collection
            || content_type.contains("directory")
            || content_type.contains("collection")
            || self.href.ends_with('/')
    }

    /// Decoded absolute path, resolving relative hrefs against `base`.
    pub fn path_from(&self, base: &str) -> String {
        normalize_path(&self.href, base)
    }

    /// Decoded absolute path for hrefs that are already absolute.
    pub fn path(&self) -> String {
        self.path_from("/")
    }
}
