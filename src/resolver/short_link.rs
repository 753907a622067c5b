//! `1drv.ms` short-link expansion.
//!
//! A full GET is used rather than HEAD: some redirect targets depend on
//! cookies and headers set along the GET chain.

use reqwest::Client;
use tracing::{debug, instrument};

use crate::http::{ClientPurpose, HttpSettings, build_http_client};

use super::ResolveError;

/// Follows redirects to materialize a short link into its long form.
#[derive(Debug, Clone)]
pub struct ShortLinkExpander {
    client: Client,
}

impl ShortLinkExpander {
    /// Creates an expander using the shared HTTP policy.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Setup`] when the HTTP client cannot be built.
    pub fn new(settings: &HttpSettings) -> Result<Self, ResolveError> {
        let client = build_http_client(settings, ClientPurpose::Resolution)
            .map_err(|e| ResolveError::setup(e.to_string()))?;
        Ok(Self { client })
    }

    /// Returns the URL reached after following every redirect from `url`.
    ///
    /// The response status is not checked: the landing page may well be a
    /// 4xx sign-in wall whose URL still carries the identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Transport`] when the request itself fails.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn expand(&self, url: &str) -> Result<String, ResolveError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ResolveError::from_reqwest(url, &e))?;
        let expanded = response.url().to_string();
        debug!(status = response.status().as_u16(), expanded = %expanded, "short link expanded");
        Ok(expanded)
    }
}
