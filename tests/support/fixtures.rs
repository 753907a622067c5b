//! In-memory stand-ins for the strategy and storage seams.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use onedrive_r2_core::progress::{ProgressObserver, TransferPhase, TransferProgress};
use onedrive_r2_core::resolver::{
    ResolutionSource, ResolveError, ResolveStrategy, ResolvedFile, ShareTarget,
};
use onedrive_r2_core::storage::{ObjectStore, UploadError};

/// Objects written to a [`MemoryStore`], keyed by object key.
pub type StoredObjects = Arc<Mutex<Vec<(String, Vec<u8>)>>>;

/// Object store keeping uploads in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pub objects: StoredObjects,
    pub fail_with: Option<String>,
}

impl MemoryStore {
    pub fn failing(reason: &str) -> Self {
        Self {
            objects: StoredObjects::default(),
            fail_with: Some(reason.to_string()),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        "test-bucket"
    }

    async fn upload_file(
        &self,
        path: &Path,
        key: &str,
        progress: &dyn ProgressObserver,
    ) -> Result<u64, UploadError> {
        if let Some(reason) = &self.fail_with {
            return Err(UploadError::request("PutObject", "test-bucket", key, reason.clone()));
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| UploadError::io(path, e))?;
        let size = bytes.len() as u64;
        progress.on_start(TransferPhase::Upload, Some(size));
        progress.on_progress(&TransferProgress {
            phase: TransferPhase::Upload,
            bytes_transferred: size,
            total_bytes: Some(size),
            delta: size,
        });
        progress.on_finish(TransferPhase::Upload);
        self.objects.lock().unwrap().push((key.to_string(), bytes));
        Ok(size)
    }
}

/// Strategy returning a canned result and counting calls.
pub struct CannedStrategy {
    pub label: &'static str,
    pub result: Result<ResolvedFile, ResolveError>,
    pub calls: Arc<AtomicUsize>,
    pub seen_urls: Arc<Mutex<Vec<String>>>,
}

impl CannedStrategy {
    pub fn ok(label: &'static str, file: ResolvedFile) -> Self {
        Self::with_result(label, Ok(file))
    }

    pub fn failing(label: &'static str, reason: &str) -> Self {
        Self::with_result(
            label,
            Err(ResolveError::extraction("https://share.example", "download URL", reason)),
        )
    }

    fn with_result(label: &'static str, result: Result<ResolvedFile, ResolveError>) -> Self {
        Self {
            label,
            result,
            calls: Arc::new(AtomicUsize::new(0)),
            seen_urls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn seen_urls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.seen_urls)
    }
}

#[async_trait]
impl ResolveStrategy for CannedStrategy {
    fn name(&self) -> &str {
        self.label
    }

    async fn resolve(&self, target: &ShareTarget) -> Result<ResolvedFile, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_urls
            .lock()
            .unwrap()
            .push(target.expanded_url.clone());
        self.result.clone()
    }
}

/// A resolved file served from `download_url`.
pub fn resolved(name: &str, download_url: &str, size_bytes: u64) -> ResolvedFile {
    ResolvedFile {
        name: name.to_string(),
        download_url: download_url.to_string(),
        size_bytes,
        source: ResolutionSource::Browser,
    }
}
