//! Object-store configuration from the environment.
//!
//! Values come from `R2_*` environment variables. A `.env` file in the
//! working directory is loaded first when present; variables already set in
//! the process environment win over the file.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

/// S3-compatible endpoint URL.
pub const ENV_ENDPOINT_URL: &str = "R2_ENDPOINT_URL";
/// Access key ID.
pub const ENV_ACCESS_KEY_ID: &str = "R2_ACCESS_KEY_ID";
/// Secret access key.
pub const ENV_SECRET_ACCESS_KEY: &str = "R2_SECRET_ACCESS_KEY";
/// Target bucket.
pub const ENV_BUCKET_NAME: &str = "R2_BUCKET_NAME";

/// Region sent to the S3 API; R2 ignores it but the SDK requires one.
pub const R2_REGION: &str = "auto";

/// Errors raised while loading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// One or more required variables are unset or blank.
    #[error(
        "missing object store configuration: {}\n  Suggestion: Set them in the environment or in a .env file",
        .names.join(", ")
    )]
    Missing {
        /// Names of every missing variable.
        names: Vec<&'static str>,
    },

    /// The endpoint is not an http(s) URL.
    #[error("invalid R2_ENDPOINT_URL '{value}': expected an http(s) URL")]
    InvalidEndpoint {
        /// The rejected value.
        value: String,
    },
}

/// Credentials and location of the target bucket.
#[derive(Clone, PartialEq, Eq)]
pub struct R2Config {
    /// S3-compatible endpoint, e.g. `https://<account>.r2.cloudflarestorage.com`.
    pub endpoint_url: String,
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Bucket that receives uploads.
    pub bucket_name: String,
}

impl R2Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] listing every unset variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through an arbitrary lookup function.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] listing every unset or blank
    /// variable, or [`ConfigError::InvalidEndpoint`] for a non-http endpoint.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut read = |name: &'static str| {
            let value = lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty());
            if value.is_none() {
                missing.push(name);
            }
            value.unwrap_or_default()
        };

        let endpoint_url = read(ENV_ENDPOINT_URL);
        let access_key_id = read(ENV_ACCESS_KEY_ID);
        let secret_access_key = read(ENV_SECRET_ACCESS_KEY);
        let bucket_name = read(ENV_BUCKET_NAME);

        if !missing.is_empty() {
            return Err(ConfigError::Missing { names: missing });
        }
        if !(endpoint_url.starts_with("http://") || endpoint_url.starts_with("https://")) {
            return Err(ConfigError::InvalidEndpoint {
                value: endpoint_url,
            });
        }

        Ok(Self {
            endpoint_url,
            access_key_id,
            secret_access_key,
            bucket_name,
        })
    }
}

impl fmt::Debug for R2Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("R2Config")
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("bucket_name", &self.bucket_name)
            .finish()
    }
}

/// Loads `.env` from the working directory if one exists.
///
/// Returns the path that was loaded. A malformed file is logged and ignored.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            debug!(path = %path.display(), "loaded .env");
            Some(path)
        }
        Err(err) if err.not_found() => None,
        Err(err) => {
            debug!(error = %err, "ignoring unreadable .env");
            None
        }
    }
}
