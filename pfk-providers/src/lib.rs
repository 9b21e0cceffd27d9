// SPDX-License-Identifier: AGPL-3.0-or-later
//! Photo Frame Kiosk Providers
//!
//! Remote media access over WebDAV:
//! - Directory listings via PROPFIND
//! - Authenticated content retrieval
//! - Recursive media discovery across a folder tree

pub mod crawler;
pub mod multistatus;
pub mod webdav;

pub use crawler::{Crawler, CrawlerConfig};
pub use multistatus::{parse_http_date, parse_multistatus};
pub use webdav::{status_error, WebDavClient, WebDavConfig};
