// SPDX-License-Identifier: AGPL-3.0-or-later
//! Remote source traits
//!
//! The crawler and the fetch pipeline only see these traits, so tests can
//! swap the WebDAV client for in-memory fakes.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use std::path::Path;

use crate::path::normalize_path;
use crate::{PfkResult, RemoteResource};

/// PROPFIND depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// The resource itself
    Zero,
    /// The resource and its immediate children
    One,
}

impl Depth {
    pub fn as_header(&self) -> &'static str {
        match self {
            Depth::Zero => "0",
            Depth::One => "1",
        }
    }
}

/// Lists remote directories
#[async_trait]
pub trait DirectoryLister: Send + Sync {
    /// Children of `path`, excluding `path` itself. Any failure yields an
    /// empty list, so an empty result may also mean "could not list".
    async fn list_directory(&self, path: &str, depth: Depth) -> Vec<RemoteResource>;

    /// Absolute fetch URL for a normalized server path
    fn item_url(&self, path: &str) -> PfkResult<Url>;

    /// The path as it appears in this server's hrefs, so that a
    /// caller-supplied path compares equal to the server's own listing of it
    fn canonical_path(&self, path: &str) -> String {
        normalize_path(path, "/")
    }
}

/// Retrieves file content
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Whole body in memory; meant for images
    async fn fetch_bytes(&self, url: &Url) -> PfkResult<Bytes>;

    /// Stream the body into `dest`, returning the number of bytes written
    async fn download_to(&self, url: &Url, dest: &Path) -> PfkResult<u64>;

    /// A URL a player can stream from directly, credentials included
    fn direct_stream_url(&self, url: &Url) -> PfkResult<Url>;
}
