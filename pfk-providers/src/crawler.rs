// SPDX-License-Identifier: AGPL-3.0-or-later
//! Recursive media discovery
//!
//! Walks a remote folder tree one `Depth: 1` listing at a time, fanning out
//! across sibling subdirectories. Listings in flight are capped by a
//! semaphore; a permit is held only for the listing call itself.
//!
//! Servers are not trusted to present a tree: a directory already visited
//! in this crawl is not listed again, and nothing deeper than `max_depth`
//! below the root is listed at all.

use futures::future::{join_all, BoxFuture, FutureExt};
use parking_lot::Mutex;
use pfk_core::path::depth;
use pfk_core::{classify, Depth, DirectoryLister, UnifiedMediaItem};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Crawler limits
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Directory listings allowed in flight at once
    pub max_concurrency: usize,
    /// Levels below the crawl root that are still listed
    pub max_depth: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            max_depth: 32,
        }
    }
}

/// Crawls remote folders into a flat media list
pub struct Crawler {
    lister: Arc<dyn DirectoryLister>,
    config: CrawlerConfig,
    permits: Arc<Semaphore>,
}

impl Crawler {
    pub fn new(lister: Arc<dyn DirectoryLister>, config: CrawlerConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            lister,
            config,
            permits,
        }
    }

    /// Every image and video below `root`.
    ///
    /// Never fails: a directory that cannot be listed contributes nothing
    /// and its siblings are unaffected. Items within one directory keep the
    /// server's order; no order is promised across directories.
    pub async fn crawl(&self, root: &str) -> Vec<UnifiedMediaItem> {
        let root = self.lister.canonical_path(root);
        let visited = Mutex::new(HashSet::from([root.clone()]));

        let items = self.crawl_dir(root.clone(), 0, &visited).await;
        info!(
            root = %root,
            items = items.len(),
            directories = visited.lock().len(),
            "crawl finished"
        );
        items
    }

    /// Crawl several roots, dropping items already seen under an earlier one
    pub async fn crawl_all(&self, roots: &[String]) -> Vec<UnifiedMediaItem> {
        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for root in roots {
            for item in self.crawl(root).await {
                if seen.insert(item.id.clone()) {
                    items.push(item);
                }
            }
        }

        items
    }

    fn crawl_dir<'a>(
        &'a self,
        path: String,
        level: usize,
        visited: &'a Mutex<HashSet<String>>,
    ) -> BoxFuture<'a, Vec<UnifiedMediaItem>> {
        async move {
            let listing = {
                let _permit = self.permits.acquire().await.ok();
                self.lister.list_directory(&path, Depth::One).await
            };

            let mut items = Vec::new();
            let mut subdirs = Vec::new();

            for resource in listing {
                let child = resource.path_from(&path);
                if child == path {
                    continue;
                }

                if resource.is_directory() {
                    if level + 1 > self.config.max_depth {
                        warn!(path = %child, max_depth = self.config.max_depth, "depth limit reached, not descending");
                        continue;
                    }
                    if !visited.lock().insert(child.clone()) {
                        warn!(path = %child, "directory already visited, possible loop");
                        continue;
                    }
                    subdirs.push(child);
                    continue;
                }

                let Some(kind) = classify(&resource.content_type, &child) else {
                    debug!(path = %child, content_type = %resource.content_type, "skipping unsupported file");
                    continue;
                };

                match self.lister.item_url(&child) {
                    Ok(url) => items.push(UnifiedMediaItem::remote(url, kind, resource.last_modified)),
                    Err(e) => warn!(path = %child, error = %e, "cannot build item URL"),
                }
            }

            debug!(
                path = %path,
                depth = depth(&path),
                files = items.len(),
                subdirectories = subdirs.len(),
                "listed directory"
            );

            let children = join_all(
                subdirs
                    .into_iter()
                    .map(|dir| self.crawl_dir(dir, level + 1, visited)),
            )
            .await;

            for child_items in children {
                items.extend(child_items);
            }
            items
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pfk_core::{MediaKind, PfkResult, RemoteResource};
    use reqwest::Url;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// In-memory server: path -> children
    #[derive(Default)]
    struct FakeLister {
        /// Path prefix of the server's hrefs, like a base URL of `/dav`
        prefix: String,
        tree: HashMap<String, Vec<RemoteResource>>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakeLister {
        fn dir(mut self, path: &str, children: Vec<RemoteResource>) -> Self {
            self.tree.insert(path.to_string(), children);
            self
        }
    }

    #[async_trait]
    impl DirectoryLister for FakeLister {
        async fn list_directory(&self, path: &str, _depth: Depth) -> Vec<RemoteResource> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            // Unknown paths behave like a failed listing
            self.tree.get(path).cloned().unwrap_or_default()
        }

        fn item_url(&self, path: &str) -> PfkResult<Url> {
            Ok(Url::parse("https://nas.local").unwrap().join(path).unwrap())
        }

        fn canonical_path(&self, path: &str) -> String {
            let path = path.trim_end_matches('/');
            if path.starts_with(&self.prefix) {
                path.to_string()
            } else {
                format!("{}{}", self.prefix, path)
            }
        }
    }

    fn file(href: &str, content_type: &str) -> RemoteResource {
        RemoteResource::new(href).with_content_type(content_type)
    }

    fn folder(href: &str) -> RemoteResource {
        RemoteResource::new(href).collection()
    }

    fn ids(items: &[UnifiedMediaItem]) -> HashSet<String> {
        items.iter().map(|i| i.id.clone()).collect()
    }

    fn crawler(lister: FakeLister, config: CrawlerConfig) -> (Crawler, Arc<FakeLister>) {
        let lister = Arc::new(lister);
        (Crawler::new(lister.clone(), config), lister)
    }

    #[tokio::test]
    async fn test_recursive_crawl_and_classification() {
        let lister = FakeLister::default()
            .dir(
                "/photos",
                vec![
                    file("/photos/a.jpg", "image/jpeg"),
                    file("/photos/clip.MOV", ""),
                    file("/photos/notes.txt", "text/plain"),
                    folder("/photos/2023/"),
                ],
            )
            .dir("/photos/2023", vec![file("/photos/2023/b.heic", "")]);
        let (crawler, _) = crawler(lister, CrawlerConfig::default());

        let items = crawler.crawl("/photos/").await;
        assert_eq!(items.len(), 3);

        // Server order within one directory is kept
        assert_eq!(items[0].id, "https://nas.local/photos/a.jpg");
        assert_eq!(items[0].kind, MediaKind::Image);
        assert_eq!(items[1].kind, MediaKind::Video);
        assert_eq!(items[2].id, "https://nas.local/photos/2023/b.heic");
    }

    #[tokio::test]
    async fn test_failed_subdirectory_keeps_siblings() {
        let lister = FakeLister::default()
            .dir(
                "/root",
                vec![folder("/root/ok/"), folder("/root/broken/"), file("/root/top.png", "")],
            )
            .dir("/root/ok", vec![file("/root/ok/1.jpg", "image/jpeg")]);
        // "/root/broken" is unknown to the fake and lists as empty
        let (crawler, _) = crawler(lister, CrawlerConfig::default());

        let items = crawler.crawl("/root").await;
        assert_eq!(
            ids(&items),
            HashSet::from([
                "https://nas.local/root/top.png".to_string(),
                "https://nas.local/root/ok/1.jpg".to_string(),
            ])
        );
    }

    #[tokio::test]
    async fn test_self_referencing_tree_terminates() {
        let lister = FakeLister::default()
            .dir("/loop", vec![folder("/loop/"), folder("/loop/a/"), file("/loop/x.jpg", "")])
            // Child points back at its parent and at itself
            .dir("/loop/a", vec![folder("/loop/"), folder("/loop/a/"), folder("/loop/a/b/")])
            .dir("/loop/a/b", vec![folder("/loop/a/"), file("/loop/a/b/y.jpg", "")]);
        let (crawler, lister) = crawler(lister, CrawlerConfig::default());

        let items = crawler.crawl("/loop").await;
        assert_eq!(items.len(), 2);
        assert_eq!(lister.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_root_link_back_under_path_prefix() {
        let lister = FakeLister {
            prefix: "/dav".to_string(),
            ..FakeLister::default()
        }
        .dir("/dav/P", vec![folder("/dav/P/"), file("/dav/P/x.jpg", ""), folder("/dav/P/a/")])
        .dir("/dav/P/a", vec![folder("/dav/P/"), file("/dav/P/a/y.jpg", "")]);
        let (crawler, lister) = crawler(lister, CrawlerConfig::default());

        let items = crawler.crawl("/P").await;
        assert_eq!(items.len(), 2);
        assert_eq!(lister.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let mut lister = FakeLister::default();
        let mut path = String::from("/d");
        for i in 0..10 {
            let child = format!("{path}/{i}");
            lister = lister.dir(&path, vec![folder(&format!("{child}/")), file(&format!("{path}/f.jpg"), "")]);
            path = child;
        }
        let (crawler, lister) = crawler(
            lister,
            CrawlerConfig {
                max_concurrency: 2,
                max_depth: 3,
            },
        );

        let items = crawler.crawl("/d").await;
        // Root plus three levels below it
        assert_eq!(lister.calls.load(Ordering::SeqCst), 4);
        assert_eq!(items.len(), 4);
    }

    #[tokio::test]
    async fn test_fan_out_is_bounded() {
        let children: Vec<_> = (0..20).map(|i| folder(&format!("/wide/{i}/"))).collect();
        let mut lister = FakeLister::default().dir("/wide", children);
        for i in 0..20 {
            lister = lister.dir(&format!("/wide/{i}"), vec![file(&format!("/wide/{i}/p.jpg"), "")]);
        }
        let (crawler, lister) = crawler(
            lister,
            CrawlerConfig {
                max_concurrency: 3,
                max_depth: 8,
            },
        );

        let items = crawler.crawl("/wide").await;
        assert_eq!(items.len(), 20);
        assert!(lister.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_crawl_all_deduplicates() {
        let lister = FakeLister::default()
            .dir("/a", vec![file("/a/1.jpg", ""), folder("/a/b/")])
            .dir("/a/b", vec![file("/a/b/2.jpg", "")]);
        let (crawler, _) = crawler(lister, CrawlerConfig::default());

        let items = crawler
            .crawl_all(&["/a".to_string(), "/a/b".to_string()])
            .await;
        assert_eq!(items.len(), 2);
    }
}
