//! Error types for object-store uploads.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while uploading a file to the object store.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The S3 client could not be configured.
    #[error("object store setup failed: {reason}")]
    Setup {
        /// Why setup failed.
        reason: String,
    },

    /// Reading the local file failed.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// The local file being uploaded.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The object store rejected a request or the connection dropped.
    #[error("{operation} failed for s3://{bucket}/{key}: {reason}")]
    Request {
        /// S3 operation name.
        operation: &'static str,
        /// Target bucket.
        bucket: String,
        /// Target key.
        key: String,
        /// Service or transport error, with context.
        reason: String,
    },
}

impl UploadError {
    /// Creates a setup error.
    pub fn setup(reason: impl Into<String>) -> Self {
        Self::Setup {
            reason: reason.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a request error.
    pub fn request(
        operation: &'static str,
        bucket: &str,
        key: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::Request {
            operation,
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_error_request_display() {
        let err = UploadError::request("PutObject", "media", "in/a.zip", "AccessDenied");
        assert_eq!(
            err.to_string(),
            "PutObject failed for s3://media/in/a.zip: AccessDenied"
        );
    }

    #[test]
    fn test_upload_error_io_display() {
        let err = UploadError::io(
            "/tmp/a.zip",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/tmp/a.zip"));
    }
}
