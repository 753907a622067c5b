//! Share-link resolution: turning a OneDrive or SharePoint link into a
//! direct download URL, a filename, and a size hint.
//!
//! # Architecture
//!
//! - [`classify`] - Pure host-based routing into a [`LinkKind`]
//! - [`ShortLinkExpander`] - Follows `1drv.ms` redirects to the long URL
//! - [`extract_identifier`] - Ordered rule table recovering the share identifier
//! - [`ResolveStrategy`] - Async trait implemented by each strategy
//! - [`MetadataResolver`] - Shares API lookup (fast path)
//! - [`PageScraper`] - Pattern tables, URL mutation checks, and iframe following
//! - [`BrowserCapability`] - Optional headless-browser strategy
//! - [`LinkResolver`] - Plans and runs strategies for one link
//!
//! # Example
//!
//! ```no_run
//! use onedrive_r2_core::http::HttpSettings;
//! use onedrive_r2_core::resolver::{BrowserCapability, LinkResolver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = LinkResolver::new(&HttpSettings::default(), BrowserCapability::disabled())?;
//! let file = resolver.resolve("https://1drv.ms/u/s!AbCdEf").await?;
//! println!("{} -> {}", file.name, file.download_url);
//! # Ok(())
//! # }
//! ```

mod browser;
mod classify;
mod error;
mod identifier;
mod metadata;
mod orchestrator;
mod patterns;
mod scraper;
mod short_link;
mod utils;

pub use browser::{
    BrowserCapability, BrowserResolver, BrowserSettings, DOWNLOAD_SELECTORS, DomScan,
    FILENAME_SELECTORS, ScanDecision, ScriptPayload, decide_scan, dom_scan_script,
};
pub use classify::{LinkKind, classify, classify_supported};
pub use error::ResolveError;
pub use identifier::{IDENTIFIER_RULES, Identifier, IdentifierRule, extract_identifier};
pub use metadata::{METADATA_PLACEHOLDER_NAME, MetadataResolver};
pub use orchestrator::{LinkResolver, StrategyKind, plan_strategies};
pub use patterns::{
    DOWNLOAD_URL_RULES, FILENAME_RULES, PLACEHOLDER_NAME as SCRAPE_PLACEHOLDER_NAME,
    PatternMatch, PatternRule, choose_filename, decode_html_entities, extract_download_url,
    extract_filename, extract_iframe_src, filename_from_url, mutation_candidates,
    unescape_embedded,
};
pub use scraper::{MAX_IFRAME_DEPTH, PageScraper};
pub use short_link::ShortLinkExpander;

use std::fmt;

use async_trait::async_trait;

/// Where a resolved file came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionSource {
    /// Shares metadata endpoint, keyed by the extracted identifier.
    Metadata {
        /// Identifier sent to the endpoint.
        identifier: String,
    },
    /// A download URL pattern in page content.
    PageScrape {
        /// Iframe depth the page was found at (0 = the share page).
        depth: usize,
    },
    /// A mutated share URL that answered like a file.
    UrlMutation {
        /// Iframe depth of the mutated page.
        depth: usize,
    },
    /// Rendered page inspected in a headless browser.
    Browser,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata { .. } => f.write_str("metadata"),
            Self::PageScrape { depth } => write!(f, "page-scrape(depth {depth})"),
            Self::UrlMutation { depth } => write!(f, "url-mutation(depth {depth})"),
            Self::Browser => f.write_str("browser"),
        }
    }
}

/// Output of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Filename as reported by the source (unsanitized).
    pub name: String,
    /// Absolute URL that serves the file bytes.
    pub download_url: String,
    /// Size hint in bytes; `0` means unknown.
    pub size_bytes: u64,
    /// Which strategy produced this result.
    pub source: ResolutionSource,
}

/// A classified share link ready for strategy execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareTarget {
    /// The link exactly as supplied.
    pub original_url: String,
    /// The link after short-link expansion (same as original otherwise).
    pub expanded_url: String,
    /// Resolution family.
    pub kind: LinkKind,
    /// Identifier, when one could be extracted.
    pub identifier: Option<Identifier>,
}

/// A single resolution strategy.
///
/// Implementations make at most one logical attempt and never retry; the
/// orchestrator decides what runs next.
#[async_trait]
pub trait ResolveStrategy: Send + Sync {
    /// Stable strategy name, used in logs and [`ResolveError::Exhausted`].
    fn name(&self) -> &str;

    /// Attempts to resolve `target` to a downloadable file.
    async fn resolve(&self, target: &ShareTarget) -> Result<ResolvedFile, ResolveError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_source_display() {
        assert_eq!(
            ResolutionSource::Metadata {
                identifier: "X".to_string()
            }
            .to_string(),
            "metadata"
        );
        assert_eq!(
            ResolutionSource::PageScrape { depth: 1 }.to_string(),
            "page-scrape(depth 1)"
        );
        assert_eq!(ResolutionSource::Browser.to_string(), "browser");
    }
}
