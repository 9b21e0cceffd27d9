// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cache eviction policy
//!
//! Least-recently-used by file mtime. Once the cache is over budget, the
//! oldest entries go until the total is at 90% of the budget, leaving
//! headroom so the next write does not immediately trigger another pass.

use chrono::{DateTime, Utc};

use crate::key::CacheKey;

/// Target utilization after eviction, as a fraction of the budget
const TARGET_NUMERATOR: u64 = 9;
const TARGET_DENOMINATOR: u64 = 10;

/// Cache entry info for eviction decisions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryInfo {
    pub key: CacheKey,
    pub size: u64,
    /// Last access (file mtime)
    pub modified: DateTime<Utc>,
}

/// Entries selected for deletion
#[derive(Debug, Clone, Default)]
pub struct EvictionPlan {
    /// Oldest first
    pub evict: Vec<CacheEntryInfo>,
    /// Sum of the selected entries' sizes
    pub size_freed: u64,
    /// Size the cache should be at once the plan is carried out
    pub target: u64,
}

impl EvictionPlan {
    pub fn is_empty(&self) -> bool {
        self.evict.is_empty()
    }
}

/// Outcome of an eviction pass
#[derive(Debug, Clone, Default)]
pub struct EvictionReport {
    pub files_deleted: usize,
    pub bytes_freed: u64,
    pub size_before: u64,
    pub size_after: u64,
    /// Deletions that failed and were skipped
    pub failures: usize,
}

/// Size the cache is trimmed down to: 90% of `budget`
pub fn eviction_target(budget: u64) -> u64 {
    ((budget as u128 * TARGET_NUMERATOR as u128) / TARGET_DENOMINATOR as u128) as u64
}

/// Choose which entries to delete to bring `current_size` within budget.
///
/// Nothing is selected while `current_size <= budget`. Otherwise entries
/// are taken oldest-mtime first until the remainder is at or below
/// [`eviction_target`].
pub fn plan_eviction(entries: &[CacheEntryInfo], current_size: u64, budget: u64) -> EvictionPlan {
    let target = eviction_target(budget);

    if current_size <= budget {
        return EvictionPlan {
            target,
            ..Default::default()
        };
    }

    let mut candidates: Vec<&CacheEntryInfo> = entries.iter().collect();
    candidates.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.key.cmp(&b.key)));

    let mut evict = Vec::new();
    let mut size_freed = 0u64;

    for candidate in candidates {
        if current_size.saturating_sub(size_freed) <= target {
            break;
        }
        size_freed += candidate.size;
        evict.push(candidate.clone());
    }

    EvictionPlan {
        evict,
        size_freed,
        target,
    }
}
