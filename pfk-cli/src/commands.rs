// SPDX-License-Identifier: AGPL-3.0-or-later
//! CLI command implementations

use bytesize::ByteSize;
use chrono::{DateTime, Utc};
use console::style;
use pfk_cache::MediaCache;
use pfk_core::path::file_name;
use pfk_core::{MediaKind, PfkError, PfkResult, RemoteResource, UnifiedMediaItem};
use pfk_media::{MediaLibrary, PlayableLocation};
use reqwest::Url;
use std::path::Path;
use tabled::{Table, Tabled};

use crate::config::Config;

async fn open_library(config: &Config) -> PfkResult<MediaLibrary> {
    MediaLibrary::connect(config.webdav()?, config.media_cache(), config.library()).await
}

/// Cache commands work without a server configured
async fn open_cache(config: &Config) -> PfkResult<MediaCache> {
    Ok(MediaCache::new(config.media_cache()).await?)
}

/// Format a timestamp for display
fn format_time(dt: Option<DateTime<Utc>>) -> String {
    dt.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Format file size
fn format_size(size: Option<u64>, human: bool) -> String {
    match size {
        Some(s) if human => ByteSize(s).to_string(),
        Some(s) => s.to_string(),
        None => "-".to_string(),
    }
}

fn format_kind(resource: &RemoteResource) -> String {
    if resource.is_directory() {
        style("d").cyan().to_string()
    } else {
        "-".to_string()
    }
}

fn format_media_kind(kind: MediaKind) -> String {
    match kind {
        MediaKind::Image => style("image").green().to_string(),
        MediaKind::Video => style("video").magenta().to_string(),
        MediaKind::LivePhoto => style("live").yellow().to_string(),
    }
}

/// URL safe to print: no password
fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    if shown.password().is_some() {
        let _ = shown.set_password(Some("***"));
    }
    shown.to_string()
}

#[derive(Tabled)]
struct LsEntry {
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Modified")]
    modified: String,
    #[tabled(rename = "Name")]
    name: String,
}

#[derive(Tabled)]
struct SyncEntry {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Path")]
    path: String,
}

#[derive(Tabled)]
struct CacheRow {
    #[tabled(rename = "Last used")]
    used: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Key")]
    key: String,
}

/// Check server connectivity
pub async fn test(config: &Config) -> PfkResult<()> {
    let library = open_library(config).await?;
    library.test_connection().await?;

    println!(
        "{} connected to {}",
        style("ok").green().bold(),
        library.client().base_url()
    );
    Ok(())
}

/// List a remote folder
pub async fn ls(config: &Config, path: &str, human: bool, json: bool) -> PfkResult<()> {
    let library = open_library(config).await?;
    let listing = library.try_list_folder(path).await?;

    if json {
        let out = serde_json::to_string_pretty(&listing)
            .map_err(|e| PfkError::Other(e.to_string()))?;
        println!("{out}");
        return Ok(());
    }

    let entries: Vec<LsEntry> = listing
        .iter()
        .map(|r| {
            let path = r.path();
            LsEntry {
                kind: format_kind(r),
                size: format_size(r.content_length, human),
                modified: format_time(r.last_modified),
                name: file_name(&path).unwrap_or("/").to_string(),
            }
        })
        .collect();

    if entries.is_empty() {
        println!("(empty directory)");
    } else {
        println!("{}", Table::new(entries));
    }
    Ok(())
}

/// Crawl the configured paths
pub async fn sync(config: &Config, summary: bool) -> PfkResult<()> {
    if config.paths.is_empty() {
        return Err(PfkError::Other(
            "no paths selected; add `paths = [...]` to the config file".into(),
        ));
    }

    let library = open_library(config).await?;
    let items = library.sync_selected().await;

    let images = items.iter().filter(|i| !i.kind.is_video()).count();
    let videos = items.len() - images;

    if !summary && !items.is_empty() {
        let rows: Vec<SyncEntry> = items.iter().map(sync_row).collect();
        println!("{}", Table::new(rows));
    }

    println!(
        "Found {} images and {} videos in {} folders",
        style(images).bold(),
        style(videos).bold(),
        library.selected_paths().len()
    );
    Ok(())
}

fn sync_row(item: &UnifiedMediaItem) -> SyncEntry {
    SyncEntry {
        kind: format_media_kind(item.kind),
        created: format_time(item.creation_date),
        path: item
            .remote_url()
            .map(|u| u.path().to_string())
            .unwrap_or_else(|| item.id.clone()),
    }
}

/// Fetch one item through the cache
pub async fn fetch(config: &Config, target: &str, video: bool, out: Option<&Path>) -> PfkResult<()> {
    let library = open_library(config).await?;

    let url = if target.starts_with("http://") || target.starts_with("https://") {
        Url::parse(target).map_err(|e| PfkError::InvalidUrl(format!("{target}: {e}")))?
    } else {
        library.client().url_for_path(target)?
    };

    if video {
        match library.fetch_playable_location(&url).await? {
            PlayableLocation::Cached(path) => {
                println!("{} {}", style("cached").green(), path.display());
            }
            PlayableLocation::Direct(direct) => {
                println!("{} {}", style("stream").yellow(), redacted(&direct));
            }
        }
        library.cache().flush().await;
        return Ok(());
    }

    let bytes = library.fetch_image(&url).await?;
    if let Some(out) = out {
        tokio::fs::write(out, &bytes).await?;
        println!("Wrote {} to {}", ByteSize(bytes.len() as u64), out.display());
    } else {
        println!("Fetched {} ({})", url, ByteSize(bytes.len() as u64));
    }

    // Background disk write and eviction must land before the runtime stops
    library.cache().flush().await;
    Ok(())
}

/// Show cache usage
pub async fn cache_size(config: &Config) -> PfkResult<()> {
    let cache = open_cache(config).await?;
    let used = cache.current_size().await?;
    let budget = cache.budget();
    let pct = if budget == 0 {
        0.0
    } else {
        (used as f64 / budget as f64) * 100.0
    };

    println!("Cache: {}", cache.store().root().display());
    println!("  Used:   {} ({:.1}%)", ByteSize(used), pct);
    println!("  Budget: {}", ByteSize(budget));
    Ok(())
}

/// List cached entries
pub async fn cache_list(config: &Config, limit: usize) -> PfkResult<()> {
    let cache = open_cache(config).await?;
    let entries = cache.list_entries(limit).await?;

    if entries.is_empty() {
        println!("(cache is empty)");
        return Ok(());
    }

    let rows: Vec<CacheRow> = entries
        .into_iter()
        .map(|e| CacheRow {
            used: format_time(Some(e.modified)),
            size: ByteSize(e.size).to_string(),
            key: e.key.to_string(),
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}

/// Remove everything from the cache
pub async fn cache_clear(config: &Config) -> PfkResult<()> {
    let cache = open_cache(config).await?;
    let removed = cache.clear_all().await?;
    println!("Removed {removed} entries");
    Ok(())
}

/// Remove the entries for some URLs
pub async fn cache_rm(config: &Config, urls: &[String]) -> PfkResult<()> {
    let cache = open_cache(config).await?;
    let removed = cache.delete_entries(urls).await?;
    println!("Removed {removed} of {} entries", urls.len());
    Ok(())
}

/// Change the cache budget, trim to it and save it
pub async fn cache_budget(mut config: Config, config_path: &Path, size: &str) -> PfkResult<()> {
    let budget: ByteSize = size
        .parse()
        .map_err(|e| PfkError::Other(format!("invalid size {size:?}: {e}")))?;

    let cache = open_cache(&config).await?;
    cache.set_budget(budget.as_u64());
    let report = cache.evict().await?;

    config.cache.budget_bytes = budget.as_u64();
    config.save(config_path)?;

    println!("Budget set to {budget}");
    if report.files_deleted > 0 {
        println!(
            "Evicted {} entries ({})",
            report.files_deleted,
            ByteSize(report.bytes_freed)
        );
    }
    Ok(())
}
