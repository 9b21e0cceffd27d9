// SPDX-License-Identifier: AGPL-3.0-or-later
//! WebDAV protocol client
//!
//! Read-only: PROPFIND for listings and connection checks, GET for content.
//! Compatible with NextCloud, ownCloud, Synology, Apache mod_dav, etc.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use pfk_core::path::{encode_path, normalize_path};
use pfk_core::{
    Depth, DirectoryLister, MediaSource, PfkError, PfkResult, RemoteResource,
};
use reqwest::{header, Client, Method, RequestBuilder, StatusCode, Url};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::multistatus::parse_multistatus;

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:resourcetype/>
    <d:getcontentlength/>
    <d:getlastmodified/>
    <d:getetag/>
    <d:getcontenttype/>
  </d:prop>
</d:propfind>"#;

/// WebDAV client configuration
#[derive(Debug, Clone)]
pub struct WebDavConfig {
    /// Server URL, optionally with a path prefix
    /// (e.g. "https://cloud.example.com/remote.php/dav/files/alice")
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Total time for listings and image fetches
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Streamed downloads have no total limit, but fail once the server
    /// sends nothing for this long
    pub read_timeout: Duration,
}

impl WebDavConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
        }
    }
}

/// WebDAV client
pub struct WebDavClient {
    config: WebDavConfig,
    base: Url,
    /// Normalized path component of `base`
    base_path: String,
    http: Client,
}

impl WebDavClient {
    pub fn new(config: WebDavConfig) -> PfkResult<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| PfkError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(PfkError::InvalidUrl(config.base_url.clone()));
        }
        let base_path = normalize_path(base.path(), "/");

        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("pfk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PfkError::Other(e.to_string()))?;

        Ok(Self {
            config,
            base,
            base_path,
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Server path of the configured base URL
    pub fn root_path(&self) -> &str {
        &self.base_path
    }

    /// Map a path to an absolute server path. Paths already under the base
    /// prefix (hrefs from the server) are kept; others are taken as relative
    /// to it.
    pub fn server_path(&self, path: &str) -> String {
        let normalized = normalize_path(path, &self.base_path);
        if self.base_path == "/"
            || normalized == self.base_path
            || normalized.starts_with(&format!("{}/", self.base_path))
        {
            normalized
        } else {
            normalize_path(&format!("{}{}", self.base_path, normalized), "/")
        }
    }

    /// Absolute URL for a path
    pub fn url_for_path(&self, path: &str) -> PfkResult<Url> {
        let encoded = encode_path(&self.server_path(path));
        self.base
            .join(&encoded)
            .map_err(|e| PfkError::InvalidUrl(format!("{encoded}: {e}")))
    }

    /// Collection URLs get a trailing slash so servers do not answer a
    /// PROPFIND with a redirect
    fn collection_url(&self, path: &str) -> PfkResult<Url> {
        let mut url = self.url_for_path(path)?;
        if !url.path().ends_with('/') {
            let with_slash = format!("{}/", url.path());
            url.set_path(&with_slash);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.config.username, Some(&self.config.password))
    }

    /// GET carrying the Basic-Auth header, for content retrieval
    pub fn authenticated_request(&self, url: &Url) -> RequestBuilder {
        self.request(Method::GET, url.clone())
    }

    async fn propfind(&self, path: &str, depth: Depth) -> PfkResult<reqwest::Response> {
        let method = Method::from_bytes(b"PROPFIND").map_err(|e| PfkError::Other(e.to_string()))?;
        let url = self.collection_url(path)?;

        debug!(url = %url, depth = depth.as_header(), "PROPFIND");

        let response = self
            .request(method, url)
            .header("Depth", depth.as_header())
            .header(header::CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(PROPFIND_BODY)
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        Ok(response)
    }

    /// List `path`, distinguishing failure from an empty folder
    pub async fn try_list_directory(
        &self,
        path: &str,
        depth: Depth,
    ) -> PfkResult<Vec<RemoteResource>> {
        let request_path = self.server_path(path);
        let response = self.propfind(&request_path, depth).await?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::MULTI_STATUS {
            return Err(status_error(status, &request_path));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(PfkError::MalformedResponse(format!(
                "empty PROPFIND body for {request_path}"
            )));
        }

        let resources = parse_multistatus(&body)?
            .into_iter()
            .filter(|r| r.path_from(&request_path) != request_path)
            .collect();

        Ok(resources)
    }

    /// Check that the server is reachable and accepts the credentials
    pub async fn test_connection(&self) -> PfkResult<()> {
        let root = self.base_path.clone();
        let response = self.propfind(&root, Depth::Zero).await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::MULTI_STATUS {
            debug!(status = status.as_u16(), "connection test passed");
            Ok(())
        } else {
            Err(status_error(status, &root))
        }
    }

    async fn get(&self, url: &Url, timeout: Option<Duration>) -> PfkResult<reqwest::Response> {
        let mut request = self.authenticated_request(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, url.path()));
        }
        Ok(response)
    }
}

/// Map a failed HTTP status onto the error taxonomy
pub fn status_error(status: StatusCode, path: &str) -> PfkError {
    match status {
        StatusCode::UNAUTHORIZED => PfkError::AuthFailed("check username and password".into()),
        StatusCode::NOT_FOUND => PfkError::NotFound(path.to_string()),
        _ => PfkError::Server {
            status: status.as_u16(),
            message: status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string(),
        },
    }
}

#[async_trait]
impl DirectoryLister for WebDavClient {
    async fn list_directory(&self, path: &str, depth: Depth) -> Vec<RemoteResource> {
        match self.try_list_directory(path, depth).await {
            Ok(resources) => resources,
            Err(e) => {
                warn!(path, error = %e, "directory listing failed");
                Vec::new()
            }
        }
    }

    fn item_url(&self, path: &str) -> PfkResult<Url> {
        self.url_for_path(path)
    }

    fn canonical_path(&self, path: &str) -> String {
        self.server_path(path)
    }
}

#[async_trait]
impl MediaSource for WebDavClient {
    async fn fetch_bytes(&self, url: &Url) -> PfkResult<Bytes> {
        let response = self.get(url, Some(self.config.request_timeout)).await?;
        Ok(response.bytes().await?)
    }

    async fn download_to(&self, url: &Url, dest: &Path) -> PfkResult<u64> {
        let idle = self.config.read_timeout;
        let response = tokio::time::timeout(idle, self.get(url, None))
            .await
            .map_err(|_| PfkError::Timeout)??;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        loop {
            let next = tokio::time::timeout(idle, stream.next()).await.map_err(|_| {
                warn!(url = %url, bytes = written, "download stalled");
                PfkError::Timeout
            })?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.sync_all().await?;

        debug!(url = %url, bytes = written, "download complete");
        Ok(written)
    }

    fn direct_stream_url(&self, url: &Url) -> PfkResult<Url> {
        let mut direct = url.clone();
        direct
            .set_username(&self.config.username)
            .and_then(|_| direct.set_password(Some(&self.config.password)))
            .map_err(|_| PfkError::InvalidUrl(url.to_string()))?;
        Ok(direct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> WebDavClient {
        WebDavClient::new(WebDavConfig::new(base, "alice", "s3cret")).unwrap()
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(WebDavClient::new(WebDavConfig::new("not a url", "a", "b")).is_err());
        assert!(WebDavClient::new(WebDavConfig::new("ftp://nas/", "a", "b")).is_err());
    }

    #[test]
    fn test_url_for_path_without_prefix() {
        let c = client("https://nas.local:5006");
        assert_eq!(c.root_path(), "/");
        assert_eq!(
            c.url_for_path("/My Photos/a.jpg").unwrap().as_str(),
            "https://nas.local:5006/My%20Photos/a.jpg"
        );
    }

    #[test]
    fn test_url_for_path_with_prefix() {
        let c = client("https://cloud.example.com/remote.php/dav/files/alice/");
        assert_eq!(c.root_path(), "/remote.php/dav/files/alice");

        // Relative to the base
        assert_eq!(
            c.url_for_path("/Photos").unwrap().as_str(),
            "https://cloud.example.com/remote.php/dav/files/alice/Photos"
        );
        // Server hrefs already carry the prefix
        assert_eq!(
            c.url_for_path("/remote.php/dav/files/alice/Photos/x.jpg").unwrap().as_str(),
            "https://cloud.example.com/remote.php/dav/files/alice/Photos/x.jpg"
        );
    }

    #[test]
    fn test_canonical_path_carries_prefix() {
        let c = client("https://cloud.example.com/dav");
        assert_eq!(DirectoryLister::canonical_path(&c, "/P/"), "/dav/P");
        assert_eq!(DirectoryLister::canonical_path(&c, "/dav/P"), "/dav/P");
    }

    #[test]
    fn test_collection_url_has_trailing_slash() {
        let c = client("https://nas.local");
        assert_eq!(c.collection_url("/photos").unwrap().path(), "/photos/");
        assert_eq!(c.collection_url("/").unwrap().path(), "/");
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "/"),
            PfkError::AuthFailed(_)
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "/x"),
            PfkError::NotFound(p) if p == "/x"
        ));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, "/"),
            PfkError::Server { status: 500, .. }
        ));
    }

    #[test]
    fn test_direct_stream_url_embeds_credentials() {
        let c = client("https://nas.local");
        let url = Url::parse("https://nas.local/v/clip.mp4").unwrap();
        let direct = c.direct_stream_url(&url).unwrap();
        assert_eq!(direct.username(), "alice");
        assert_eq!(direct.password(), Some("s3cret"));
        assert_eq!(direct.path(), "/v/clip.mp4");
    }
}
