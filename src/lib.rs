//! OneDrive to R2 Core Library
//!
//! Copies files published through OneDrive and SharePoint share links into an
//! S3-compatible object store (Cloudflare R2).
//!
//! # Architecture
//!
//! - [`resolver`] - Turns a share link into a filename, download URL and size
//!   through an ordered list of strategies (metadata API, headless browser,
//!   page scraping)
//! - [`download`] - Streams the resolved file to local disk
//! - [`storage`] - Uploads local files to the bucket
//! - [`pipeline`] - Runs resolve, download, upload for one link or a batch
//! - [`config`] - Object store settings from the environment
//! - [`http`] - Shared HTTP client construction
//! - [`progress`] - Transfer progress callbacks

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod http;
pub mod pipeline;
pub mod progress;
pub mod resolver;
pub mod storage;
mod user_agent;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::{ConfigError, R2Config};
pub use download::{DownloadError, HttpClient, sanitize_filename};
pub use http::HttpSettings;
pub use pipeline::{BatchSummary, LinkError, LinkOutcome, LinkProcessor, LinkReport};
pub use progress::{ProgressObserver, TransferPhase, TransferProgress};
pub use resolver::{
    BrowserCapability, LinkKind, LinkResolver, ResolutionSource, ResolveError, ResolvedFile,
};
pub use storage::{ObjectStore, R2Store, UploadError, object_key};
