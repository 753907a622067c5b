//! Shared HTTP client construction policy.
//!
//! Every network call (short-link expansion, metadata lookup, page scraping,
//! mutation checks, download) goes through a client built here from an
//! explicit [`HttpSettings`] value, so timeouts and headers are configured in
//! one place and passed down rather than held in a global session.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Proxy, redirect};
use thiserror::Error;
use tracing::warn;

use crate::user_agent;

/// Default connect timeout for all requests.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Default read timeout for resolution requests (pages, metadata, mutation checks).
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;
/// Default read timeout for file downloads, which may be large.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 3600;
/// Redirect hops followed before a request is abandoned.
pub const MAX_REDIRECTS: usize = 10;

/// Transport configuration passed to every client builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout for resolution traffic; per-read inactivity
    /// timeout for downloads.
    pub read_timeout: Duration,
    /// Whole-request timeout for the file download.
    pub download_timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            download_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            user_agent: user_agent::default_user_agent(),
        }
    }
}

impl HttpSettings {
    /// Creates settings with explicit connect/read timeouts in seconds.
    #[must_use]
    pub fn with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        Self {
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            read_timeout: Duration::from_secs(read_timeout_secs),
            ..Self::default()
        }
    }
}

/// Which timeout profile a client is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPurpose {
    /// Short requests made while resolving a link.
    Resolution,
    /// The streamed file download.
    Download,
}

/// Errors raised while constructing an HTTP client.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// The reqwest builder rejected the configuration.
    #[error("HTTP client construction failed: {0}")]
    Build(#[source] reqwest::Error),

    /// The builder panicked while reading system proxy settings, twice.
    #[error("HTTP client construction panicked while loading proxy settings")]
    Panicked,
}

/// Builds a client using the shared policy: browser UA, gzip, bounded redirects.
///
/// # Errors
///
/// Returns [`HttpClientError`] when the client cannot be constructed.
pub fn build_http_client(
    settings: &HttpSettings,
    purpose: ClientPurpose,
) -> Result<Client, HttpClientError> {
    match try_build_client(settings, purpose, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Restricted sandboxes can panic inside system proxy discovery.
            warn!("HTTP client hit system proxy panic; using env-proxy fallback builder");
            match try_build_client(settings, purpose, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(HttpClientError::Panicked),
                Err(BuildClientFailure::Build(error)) => Err(HttpClientError::Build(error)),
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(HttpClientError::Build(error)),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    settings: &HttpSettings,
    purpose: ClientPurpose,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    catch_unwind(AssertUnwindSafe(|| {
        let mut builder = base_builder(settings, purpose);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(settings: &HttpSettings, purpose: ClientPurpose) -> ClientBuilder {
    let timeout = match purpose {
        ClientPurpose::Resolution => settings.read_timeout,
        ClientPurpose::Download => settings.download_timeout,
    };
    let builder = Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(timeout)
        .user_agent(settings.user_agent.clone())
        .redirect(redirect::Policy::limited(MAX_REDIRECTS))
        .gzip(true);
    match purpose {
        // Stalled transfers fail on inactivity rather than on total duration.
        ClientPurpose::Download => builder.read_timeout(settings.read_timeout),
        ClientPurpose::Resolution => builder,
    }
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = first_env_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"])
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = first_env_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"])
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn first_env_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_settings_default_timeouts() {
        let settings = HttpSettings::default();
        assert_eq!(settings.connect_timeout, Duration::from_secs(10));
        assert_eq!(settings.read_timeout, Duration::from_secs(30));
        assert_eq!(settings.download_timeout, Duration::from_secs(3600));
        assert_eq!(settings.user_agent, user_agent::BROWSER_USER_AGENT);
    }

    #[test]
    fn test_http_settings_with_timeouts_keeps_download_default() {
        let settings = HttpSettings::with_timeouts(5, 20);
        assert_eq!(settings.connect_timeout, Duration::from_secs(5));
        assert_eq!(settings.read_timeout, Duration::from_secs(20));
        assert_eq!(
            settings.download_timeout,
            Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_build_http_client_for_both_purposes() {
        let settings = HttpSettings::default();
        assert!(build_http_client(&settings, ClientPurpose::Resolution).is_ok());
        assert!(build_http_client(&settings, ClientPurpose::Download).is_ok());
    }
}
