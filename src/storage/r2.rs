//! Cloudflare R2 (S3-compatible) object store.

use std::path::Path;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::{Region, RequestChecksumCalculation, ResponseChecksumValidation};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, instrument, warn};

use crate::config::{R2_REGION, R2Config};
use crate::progress::{ProgressObserver, TransferPhase, TransferProgress};

use super::{ObjectStore, UploadError};

/// Part size for multipart uploads; files up to this size use one PUT.
pub const MULTIPART_PART_SIZE: u64 = 8 * 1024 * 1024;

/// Uploads files to an R2 bucket through the S3 API.
#[derive(Debug, Clone)]
pub struct R2Store {
    client: S3Client,
    bucket: String,
    part_size: u64,
}

impl R2Store {
    /// Builds a client for the configured endpoint with static credentials,
    /// region `auto`, and path-style addressing.
    pub async fn new(config: &R2Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "onedrive-r2",
        );
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(R2_REGION))
            .credentials_provider(credentials)
            .load()
            .await;

        Self::from_client(
            S3Client::from_conf(s3_config(config, &sdk_config)),
            &config.bucket_name,
        )
    }

    /// Wraps an existing S3 client.
    #[must_use]
    pub fn from_client(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            part_size: MULTIPART_PART_SIZE,
        }
    }

    /// Sends the file in one `PutObject`. Progress is reported once, when
    /// the request completes; there are no intermediate updates.
    async fn put_single(
        &self,
        path: &Path,
        key: &str,
        size: u64,
        progress: &dyn ProgressObserver,
    ) -> Result<u64, UploadError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| UploadError::io(path, std::io::Error::other(e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|err| {
                UploadError::request(
                    "PutObject",
                    &self.bucket,
                    key,
                    DisplayErrorContext(&err).to_string(),
                )
            })?;

        progress.on_progress(&TransferProgress {
            phase: TransferPhase::Upload,
            bytes_transferred: size,
            total_bytes: Some(size),
            delta: size,
        });
        Ok(size)
    }

    async fn put_multipart(
        &self,
        path: &Path,
        key: &str,
        size: u64,
        progress: &dyn ProgressObserver,
    ) -> Result<u64, UploadError> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                UploadError::request(
                    "CreateMultipartUpload",
                    &self.bucket,
                    key,
                    DisplayErrorContext(&err).to_string(),
                )
            })?;
        let upload_id = created.upload_id().map(str::to_string).ok_or_else(|| {
            UploadError::request("CreateMultipartUpload", &self.bucket, key, "no upload id returned")
        })?;

        match self.upload_parts(path, key, &upload_id, size, progress).await {
            Ok(parts) => {
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(
                        CompletedMultipartUpload::builder()
                            .set_parts(Some(parts))
                            .build(),
                    )
                    .send()
                    .await
                    .map_err(|err| {
                        UploadError::request(
                            "CompleteMultipartUpload",
                            &self.bucket,
                            key,
                            DisplayErrorContext(&err).to_string(),
                        )
                    })?;
                Ok(size)
            }
            Err(err) => {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(
                        key = %key,
                        error = %DisplayErrorContext(&abort_err),
                        "failed to abort multipart upload"
                    );
                }
                Err(err)
            }
        }
    }

    async fn upload_parts(
        &self,
        path: &Path,
        key: &str,
        upload_id: &str,
        size: u64,
        progress: &dyn ProgressObserver,
    ) -> Result<Vec<CompletedPart>, UploadError> {
        let mut file = File::open(path).await.map_err(|e| UploadError::io(path, e))?;
        let mut parts = Vec::new();
        let mut sent: u64 = 0;
        let mut part_number: i32 = 1;

        while sent < size {
            let chunk_len = self.part_size.min(size - sent);
            let mut buffer = vec![0_u8; usize::try_from(chunk_len).unwrap_or(usize::MAX)];
            file.read_exact(&mut buffer)
                .await
                .map_err(|e| UploadError::io(path, e))?;

            let uploaded = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(buffer))
                .send()
                .await
                .map_err(|err| {
                    UploadError::request(
                        "UploadPart",
                        &self.bucket,
                        key,
                        DisplayErrorContext(&err).to_string(),
                    )
                })?;

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
            sent += chunk_len;
            debug!(part_number, sent, "part uploaded");
            progress.on_progress(&TransferProgress {
                phase: TransferPhase::Upload,
                bytes_transferred: sent,
                total_bytes: Some(size),
                delta: chunk_len,
            });
            part_number += 1;
        }

        Ok(parts)
    }
}

/// R2 rejects the SDK's default streaming checksum trailers, so checksums are
/// only sent and validated where an operation requires them.
fn s3_config(config: &R2Config, sdk_config: &SdkConfig) -> aws_sdk_s3::Config {
    aws_sdk_s3::config::Builder::from(sdk_config)
        .endpoint_url(&config.endpoint_url)
        .force_path_style(true)
        .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
        .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
        .build()
}

#[async_trait]
impl ObjectStore for R2Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    #[instrument(skip(self, progress), fields(bucket = %self.bucket, key = %key))]
    async fn upload_file(
        &self,
        path: &Path,
        key: &str,
        progress: &dyn ProgressObserver,
    ) -> Result<u64, UploadError> {
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| UploadError::io(path, e))?
            .len();

        progress.on_start(TransferPhase::Upload, Some(size));
        let result = if size <= self.part_size {
            self.put_single(path, key, size, progress).await
        } else {
            self.put_multipart(path, key, size, progress).await
        };
        progress.on_finish(TransferPhase::Upload);

        let bytes = result?;
        info!(bytes, "upload complete");
        Ok(bytes)
    }
}
