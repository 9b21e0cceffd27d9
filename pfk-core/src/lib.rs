// SPDX-License-Identifier: AGPL-3.0-or-later
//! Photo Frame Kiosk Core
//!
//! Shared types for remote media sync: listing entries, media items,
//! server path normalization and the error taxonomy.

pub mod backend;
pub mod error;
pub mod media;
pub mod path;
pub mod resource;

pub use backend::{Depth, DirectoryLister, MediaSource};
pub use error::{PfkError, PfkResult};
pub use media::{classify, MediaKind, SourceLocator, UnifiedMediaItem};
pub use resource::RemoteResource;
