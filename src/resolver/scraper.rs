//! Share-page scraping: pattern extraction, URL mutation checks, and
//! bounded iframe following.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tracing::{debug, instrument};
use url::Url;

use crate::http::{ClientPurpose, HttpSettings, build_http_client};

use super::patterns::{
    PLACEHOLDER_NAME, extract_download_url, extract_filename, extract_iframe_src,
    filename_from_url, mutation_candidates,
};
use super::{ResolveError, ResolveStrategy, ResolutionSource, ResolvedFile, ShareTarget};

/// How many nested iframes are followed below the share page.
pub const MAX_IFRAME_DEPTH: usize = 3;

/// Scrapes share pages for a download URL.
#[derive(Debug, Clone)]
pub struct PageScraper {
    client: Client,
    max_iframe_depth: usize,
}

impl PageScraper {
    /// Creates a scraper using the shared HTTP policy.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Setup`] when the HTTP client cannot be built.
    pub fn new(settings: &HttpSettings) -> Result<Self, ResolveError> {
        let client = build_http_client(settings, ClientPurpose::Resolution)
            .map_err(|e| ResolveError::setup(e.to_string()))?;
        Ok(Self {
            client,
            max_iframe_depth: MAX_IFRAME_DEPTH,
        })
    }

    /// Overrides the iframe depth limit.
    #[must_use]
    pub fn with_max_iframe_depth(mut self, depth: usize) -> Self {
        self.max_iframe_depth = depth;
        self
    }

    /// Scrapes `url` and any iframes it embeds.
    ///
    /// Each page is tried with the download URL table first, then with
    /// mutation checks, before descending into its first iframe. A page is
    /// never fetched twice.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Transport`] when the share page itself cannot
    /// be fetched and [`ResolveError::Extraction`] when nothing yields a
    /// download URL.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn scrape(&self, url: &str) -> Result<ResolvedFile, ResolveError> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut current = url.to_string();
        let mut inherited_name: Option<String> = None;
        let mut stop_reason = "no download pattern matched".to_string();

        for depth in 0..=self.max_iframe_depth {
            if !visited.insert(current.clone()) {
                stop_reason = format!("iframe loop back to '{current}'");
                break;
            }
            let page_url = Url::parse(&current)
                .map_err(|e| ResolveError::extraction(&current, "page URL", e.to_string()))?;

            let html = match self.fetch_page(&current).await {
                Ok(html) => html,
                Err(err) if depth == 0 => return Err(err),
                Err(err) => {
                    debug!(depth, error = %err, "iframe fetch failed");
                    stop_reason = err.to_string();
                    break;
                }
            };

            let name = extract_filename(&html)
                .map(|m| m.value)
                .or_else(|| filename_from_url(&current))
                .or_else(|| inherited_name.clone())
                .unwrap_or_else(|| PLACEHOLDER_NAME.to_string());

            if let Some(found) = extract_download_url(&html, &page_url) {
                debug!(depth, rule = found.rule, "download URL found in page");
                return Ok(ResolvedFile {
                    name,
                    download_url: found.value,
                    size_bytes: 0,
                    source: ResolutionSource::PageScrape { depth },
                });
            }

            for candidate in mutation_candidates(&current) {
                if let Some(size_bytes) = self.check_candidate(&candidate).await {
                    debug!(depth, candidate = %candidate, "mutated URL serves a file");
                    return Ok(ResolvedFile {
                        name,
                        download_url: candidate,
                        size_bytes,
                        source: ResolutionSource::UrlMutation { depth },
                    });
                }
            }

            let Some(iframe_src) = extract_iframe_src(&html, &page_url) else {
                break;
            };
            if depth == self.max_iframe_depth {
                stop_reason = format!("iframe depth limit {} reached", self.max_iframe_depth);
                break;
            }
            debug!(depth, iframe = %iframe_src, "following iframe");
            if name != PLACEHOLDER_NAME {
                inherited_name = Some(name);
            }
            current = iframe_src;
        }

        Err(ResolveError::extraction(url, "download URL", stop_reason))
    }

    async fn fetch_page(&self, url: &str) -> Result<String, ResolveError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ResolveError::from_reqwest(url, &e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::http_status(url, status.as_u16()));
        }
        response
            .text()
            .await
            .map_err(|e| ResolveError::from_reqwest(url, &e))
    }

    /// HEADs `candidate`; returns the advertised size (0 if absent) when it
    /// answers 200 with a non-HTML body.
    async fn check_candidate(&self, candidate: &str) -> Option<u64> {
        let response = match self.client.head(candidate).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(candidate = %candidate, error = %err, "candidate check failed");
                return None;
            }
        };
        if response.status().as_u16() != 200 {
            return None;
        }
        let headers = response.headers();
        let is_html = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.to_ascii_lowercase().contains("text/html"));
        if is_html {
            return None;
        }
        let size = headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(0);
        Some(size)
    }
}

#[async_trait]
impl ResolveStrategy for PageScraper {
    fn name(&self) -> &str {
        "page-scrape"
    }

    async fn resolve(&self, target: &ShareTarget) -> Result<ResolvedFile, ResolveError> {
        self.scrape(&target.original_url).await
    }
}
