//! Streaming download of a resolved file to local disk.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use onedrive_r2_core::download::HttpClient;
//! use onedrive_r2_core::http::HttpSettings;
//! use onedrive_r2_core::progress::NoOpProgress;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new(&HttpSettings::default())?;
//! let outcome = client
//!     .download_to_path("https://example.com/file.zip", Path::new("/tmp/file.zip"), 0, &NoOpProgress)
//!     .await?;
//! println!("wrote {} bytes", outcome.bytes_written);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod filename;

pub use client::{DownloadOutcome, HttpClient};
pub use error::DownloadError;
pub use filename::{FALLBACK_FILENAME, MAX_FILENAME_BYTES, sanitize_filename};
