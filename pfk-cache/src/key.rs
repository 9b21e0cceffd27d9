// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cache keys derived from source URLs

use crate::{CacheError, CacheResult};

/// Longest file name a key may produce before it is shortened
const MAX_KEY_LEN: usize = 160;
/// Hex chars of the BLAKE3 suffix appended to shortened keys
const HASH_SUFFIX_LEN: usize = 16;

/// File name of a cache entry.
///
/// Built from the source URL with every character outside
/// `[A-Za-z0-9._-]` replaced by `_`, so the same URL always lands on the
/// same file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_url(url: &str) -> Self {
        let sanitized: String = url
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        if sanitized.len() <= MAX_KEY_LEN {
            return Self(sanitized);
        }

        let hash = blake3::hash(url.as_bytes());
        let suffix = &hex::encode(hash.as_bytes())[..HASH_SUFFIX_LEN];
        let keep = MAX_KEY_LEN - HASH_SUFFIX_LEN - 1;
        Self(format!("{}-{}", &sanitized[..keep], suffix))
    }

    /// Accept an on-disk file name as a key. Hidden names (the staging
    /// directory among them) and anything with a separator are rejected.
    pub fn from_file_name(name: &str) -> CacheResult<Self> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name.len() <= MAX_KEY_LEN
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));

        if valid {
            Ok(Self(name.to_string()))
        } else {
            Err(CacheError::InvalidKey(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsafe_characters_replaced() {
        let key = CacheKey::from_url("https://nas.local:5006/photos/My Trip/a.jpg");
        assert_eq!(key.as_str(), "https___nas.local_5006_photos_My_Trip_a.jpg");
    }

    #[test]
    fn test_deterministic() {
        let url = "https://nas.local/photos/a.jpg?x=1";
        assert_eq!(CacheKey::from_url(url), CacheKey::from_url(url));
    }

    #[test]
    fn test_long_url_is_shortened() {
        let url = format!("https://nas.local/{}", "deep/".repeat(100));
        let key = CacheKey::from_url(&url);
        assert_eq!(key.as_str().len(), MAX_KEY_LEN);

        let other = CacheKey::from_url(&format!("{url}x"));
        assert_ne!(key, other);
        assert!(CacheKey::from_file_name(key.as_str()).is_ok());
    }

    #[test]
    fn test_from_file_name_rejects_hidden_and_separators() {
        assert!(CacheKey::from_file_name(".staging").is_err());
        assert!(CacheKey::from_file_name("a/b").is_err());
        assert!(CacheKey::from_file_name("").is_err());
        assert!(CacheKey::from_file_name("https___nas_a.jpg").is_ok());
    }
}
