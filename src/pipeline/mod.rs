//! The per-link pipeline: resolve, download to a scratch directory, upload.
//!
//! Every failure is caught at this boundary and reported as a
//! [`LinkError`]; the scratch directory is removed on every path.

mod batch;

pub use batch::{BatchSummary, LinkOutcome, LinksFileError, parse_links, read_links_file};

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::download::{DownloadError, HttpClient, sanitize_filename};
use crate::progress::ProgressObserver;
use crate::resolver::{LinkResolver, ResolutionSource, ResolveError};
use crate::storage::{ObjectStore, UploadError, object_key};

/// Why a single link failed.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The link could not be turned into a download URL.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The resolved file could not be downloaded.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// The downloaded file could not be uploaded.
    #[error(transparent)]
    Upload(#[from] UploadError),

    /// The scratch directory could not be created.
    #[error("could not create temporary directory: {0}")]
    TempDir(#[source] std::io::Error),
}

impl LinkError {
    /// Short stage label for summaries.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Resolve(_) => "resolve",
            Self::Download(_) | Self::TempDir(_) => "download",
            Self::Upload(_) => "upload",
        }
    }
}

/// What a successfully processed link produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReport {
    /// The share link as supplied.
    pub url: String,
    /// Sanitized filename used locally and in the key.
    pub file_name: String,
    /// Destination bucket.
    pub bucket: String,
    /// Destination key.
    pub key: String,
    /// Bytes uploaded.
    pub bytes: u64,
    /// Which strategy resolved the link.
    pub source: ResolutionSource,
}

/// Moves share links into the object store, one at a time.
pub struct LinkProcessor {
    resolver: LinkResolver,
    downloader: HttpClient,
    store: Box<dyn ObjectStore>,
}

impl LinkProcessor {
    /// Assembles a processor from its three stages.
    #[must_use]
    pub fn new(
        resolver: LinkResolver,
        downloader: HttpClient,
        store: Box<dyn ObjectStore>,
    ) -> Self {
        Self {
            resolver,
            downloader,
            store,
        }
    }

    /// Resolves, downloads, and uploads one link under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError`] naming the stage that failed. Nothing is retried.
    #[instrument(skip(self, progress))]
    pub async fn process(
        &self,
        url: &str,
        prefix: &str,
        progress: &dyn ProgressObserver,
    ) -> Result<LinkReport, LinkError> {
        let resolved = self.resolver.resolve(url).await?;
        let file_name = sanitize_filename(&resolved.name);
        info!(name = %file_name, size = resolved.size_bytes, source = %resolved.source, "resolved");

        let scratch = tempfile::TempDir::new().map_err(LinkError::TempDir)?;
        let local_path = scratch.path().join(&file_name);
        self.downloader
            .download_to_path(
                &resolved.download_url,
                &local_path,
                resolved.size_bytes,
                progress,
            )
            .await?;

        let key = object_key(prefix, &file_name);
        let bytes = self.store.upload_file(&local_path, &key, progress).await?;
        info!(bucket = %self.store.bucket(), key = %key, bytes, "uploaded");

        Ok(LinkReport {
            url: url.to_string(),
            file_name,
            bucket: self.store.bucket().to_string(),
            key,
            bytes,
            source: resolved.source,
        })
    }

    /// Processes every link in order; a failed link never stops the batch.
    pub async fn process_batch(
        &self,
        links: &[String],
        prefix: &str,
        progress: &dyn ProgressObserver,
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for (index, url) in links.iter().enumerate() {
            info!(current = index + 1, total = links.len(), url = %url, "processing link");
            let outcome = match self.process(url, prefix, progress).await {
                Ok(report) => LinkOutcome::Succeeded(report),
                Err(error) => {
                    warn!(url = %url, stage = error.stage(), error = %error, "link failed");
                    LinkOutcome::Failed {
                        url: url.clone(),
                        stage: error.stage(),
                        error: error.to_string(),
                    }
                }
            };
            summary.push(outcome);
        }
        summary
    }
}

impl std::fmt::Debug for LinkProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkProcessor")
            .field("resolver", &self.resolver)
            .field("bucket", &self.store.bucket())
            .finish_non_exhaustive()
    }
}
