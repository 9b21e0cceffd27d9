// SPDX-License-Identifier: AGPL-3.0-or-later
//! Server path normalization
//!
//! WebDAV servers are inconsistent about hrefs: some return full URLs, most
//! return absolute paths, a few return paths relative to the request. All of
//! them are folded into one decoded, slash-separated absolute form here.

/// Normalize an href (or a request path) into a decoded absolute path.
///
/// `base` is the already-normalized path the href was returned for; it is
/// only consulted when `raw` is relative. The result has no trailing slash
/// except for the root itself.
pub fn normalize_path(raw: &str, base: &str) -> String {
    let raw = raw.trim();

    let path = if raw.contains("://") {
        match reqwest::Url::parse(raw) {
            Ok(url) => url.path().to_string(),
            Err(_) => raw.to_string(),
        }
    } else {
        raw.to_string()
    };

    let decoded = urlencoding::decode(&path)
        .map(|s| s.into_owned())
        .unwrap_or(path);

    let mut segments: Vec<&str> = Vec::new();
    if !decoded.starts_with('/') {
        segments.extend(base.split('/').filter(|s| !s.is_empty()));
    }

    for part in decoded.split('/').filter(|s| !s.is_empty()) {
        match part {
            "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(part),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Percent-encode each segment of a normalized path for use in a URL.
pub fn encode_path(path: &str) -> String {
    let encoded: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::encode(s).into_owned())
        .collect();

    if encoded.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", encoded.join("/"))
    }
}

/// Final segment of a path.
pub fn file_name(path: &str) -> Option<&str> {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
}

/// Extension of the final segment, without the dot.
pub fn extension(path: &str) -> Option<&str> {
    file_name(path)
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

/// Depth of a normalized path: `/` is 0, `/a/b` is 2.
pub fn depth(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty()).count()
}
