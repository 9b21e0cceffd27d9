// SPDX-License-Identifier: AGPL-3.0-or-later
//! Photo Frame Kiosk Media
//!
//! Ties the remote client, the crawler and the media cache together:
//! cache-aware fetching for images and videos, and the library facade the
//! frontends talk to.

pub mod gate;
pub mod library;
pub mod pipeline;

pub use gate::{RequestGate, RequestId};
pub use library::{MediaLibrary, MediaLibraryConfig};
pub use pipeline::{MediaFetchPipeline, PlayableLocation};
