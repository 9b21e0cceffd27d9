// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stale-request detection
//!
//! A display slot issues an id per request. When a response arrives the slot
//! checks whether a newer request has been issued since; if so the response
//! is dropped. The request itself is never cancelled.

use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier handed out by a [`RequestGate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

/// Latest-request tracker for one consumer slot
#[derive(Debug, Default)]
pub struct RequestGate {
    latest: AtomicU64,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding every earlier one
    pub fn issue(&self) -> RequestId {
        RequestId(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// True while no newer request has been issued
    pub fn is_current(&self, id: RequestId) -> bool {
        self.latest.load(Ordering::Acquire) == id.0
    }
}
