//! Streaming HTTP download of a resolved file into a local path.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use crate::http::{ClientPurpose, HttpSettings, build_http_client};
use crate::progress::{ProgressObserver, TransferPhase, TransferProgress};

use super::error::DownloadError;

/// Result of a completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Where the bytes were written.
    pub path: PathBuf,
    /// Bytes written to disk.
    pub bytes_written: u64,
    /// Content-Length announced by the server, if any.
    pub content_length: Option<u64>,
}

/// HTTP client for streaming downloads.
///
/// Uses the download timeout profile: long total timeout, same connect and
/// read timeouts as resolution.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a download client from explicit HTTP settings.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Setup`] when the client cannot be built.
    pub fn new(settings: &HttpSettings) -> Result<Self, DownloadError> {
        let client = build_http_client(settings, ClientPurpose::Download)
            .map_err(|e| DownloadError::setup(e.to_string()))?;
        Ok(Self { client })
    }

    /// Streams `url` into `dest`, reporting progress as chunks arrive.
    ///
    /// `expected_size` is the resolver's size hint (0 = unknown) and is only
    /// used for progress when the server does not announce a length. A
    /// partial file is removed on any failure.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] for invalid URLs, transport failures,
    /// non-2xx responses, IO failures, and Content-Length mismatches.
    #[instrument(skip(self, progress), fields(url = %url, dest = %dest.display()))]
    pub async fn download_to_path(
        &self,
        url: &str,
        dest: &Path,
        expected_size: u64,
        progress: &dyn ProgressObserver,
    ) -> Result<DownloadOutcome, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let content_length = response.content_length();
        let total = content_length.or((expected_size > 0).then_some(expected_size));
        debug!(status = status.as_u16(), content_length = ?content_length, "response received");

        let mut file = File::create(dest)
            .await
            .map_err(|e| DownloadError::io(dest, e))?;

        progress.on_start(TransferPhase::Download, total);
        let stream_result = stream_to_file(&mut file, response, url, dest, total, progress).await;
        progress.on_finish(TransferPhase::Download);
        drop(file);

        let bytes_written = match stream_result {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(path = %dest.display(), "removing partial file after error");
                remove_partial(dest).await;
                return Err(err);
            }
        };

        if let Some(expected) = content_length
            && expected != bytes_written
        {
            remove_partial(dest).await;
            return Err(DownloadError::integrity(dest, expected, bytes_written));
        }

        info!(bytes = bytes_written, "download complete");
        Ok(DownloadOutcome {
            path: dest.to_path_buf(),
            bytes_written,
            content_length,
        })
    }
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        debug!(path = %path.display(), error = %e, "partial file cleanup failed");
    }
}

/// Streams the response body to `file`, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    total: Option<u64>,
    progress: &dyn ProgressObserver,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        let delta = chunk.len() as u64;
        bytes_written += delta;
        progress.on_progress(&TransferProgress {
            phase: TransferPhase::Download,
            bytes_transferred: bytes_written,
            total_bytes: total,
            delta,
        });
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    use super::*;
    use crate::progress::{NoOpProgress, progress_fn};
    use crate::test_support::socket_guard::start_mock_server_or_skip;

    fn client() -> HttpClient {
        HttpClient::new(&HttpSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_download_to_path_success_reports_progress() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();
        let body = vec![7_u8; 64 * 1024];

        Mock::given(method("GET"))
            .and(path("/blob"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&mock_server)
            .await;

        let seen = Arc::new(AtomicU64::new(0));
        let seen_clone = Arc::clone(&seen);
        let observer = progress_fn(move |p: &TransferProgress| {
            seen_clone.store(p.bytes_transferred, Ordering::SeqCst);
        });

        let dest = temp_dir.path().join("blob.bin");
        let outcome = client()
            .download_to_path(&format!("{}/blob", mock_server.uri()), &dest, 0, &observer)
            .await
            .unwrap();

        assert_eq!(outcome.bytes_written, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
        assert_eq!(seen.load(Ordering::SeqCst), body.len() as u64);
    }

    #[tokio::test]
    async fn test_download_ignores_wrong_size_hint() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/hint"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"twelve bytes"))
            .mount(&mock_server)
            .await;

        let dest = temp_dir.path().join("hint.txt");
        let outcome = client()
            .download_to_path(&format!("{}/hint", mock_server.uri()), &dest, 999, &NoOpProgress)
            .await
            .unwrap();
        assert_eq!(outcome.bytes_written, 12);
    }

    #[tokio::test]
    async fn test_download_http_error_leaves_no_file() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&mock_server)
            .await;

        let dest = temp_dir.path().join("gone.bin");
        let err = client()
            .download_to_path(&format!("{}/gone", mock_server.uri()), &dest, 0, &NoOpProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::HttpStatus { status: 410, .. }), "got: {err}");
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_download_read_timeout_cleans_up() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"data")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let slow_client = HttpClient::new(&HttpSettings::with_timeouts(5, 1)).unwrap();
        let dest = temp_dir.path().join("slow.bin");
        let result = slow_client
            .download_to_path(&format!("{}/slow", mock_server.uri()), &dest, 0, &NoOpProgress)
            .await;

        assert!(result.is_err(), "expected timeout or network error");
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_download_invalid_url() {
        let temp_dir = TempDir::new().unwrap();
        let err = client()
            .download_to_path("not a url", &temp_dir.path().join("x"), 0, &NoOpProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl { .. }));
    }
}
