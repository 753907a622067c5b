//! Object-store upload: one primitive, "put this local file at key K".
//!
//! [`ObjectStore`] is the seam; [`R2Store`] is the S3-compatible
//! implementation used in production.

mod error;
mod r2;

pub use error::UploadError;
pub use r2::{MULTIPART_PART_SIZE, R2Store};

use std::path::Path;

use async_trait::async_trait;

use crate::progress::ProgressObserver;

/// Destination for uploaded files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket (or namespace) receiving the uploads.
    fn bucket(&self) -> &str;

    /// Uploads the file at `path` to `key`, returning bytes sent.
    async fn upload_file(
        &self,
        path: &Path,
        key: &str,
        progress: &dyn ProgressObserver,
    ) -> Result<u64, UploadError>;
}

/// Builds the object key for `filename` under `prefix`.
///
/// Backslashes become `/`, leading slashes are stripped, and exactly one
/// `/` separates a non-empty prefix from the filename.
#[must_use]
pub fn object_key(prefix: &str, filename: &str) -> String {
    let prefix = prefix.trim().replace('\\', "/");
    let prefix = prefix.trim_start_matches('/');
    let filename = filename.replace('\\', "/");
    let filename = filename.trim_start_matches('/');

    if prefix.is_empty() {
        return filename.to_string();
    }
    if prefix.ends_with('/') {
        format!("{prefix}{filename}")
    } else {
        format!("{prefix}/{filename}")
    }
}
