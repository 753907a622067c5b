//! Strategy planning and the per-link resolution loop.
//!
//! The plan is a pure function of the link kind, whether an identifier was
//! found, and whether a browser is available. Strategy failures are logged
//! and the next strategy runs; only when the plan is exhausted does the
//! caller see an error.

use std::fmt;

use tracing::{debug, info, instrument};

use crate::http::HttpSettings;

use super::browser::BrowserCapability;
use super::classify::{LinkKind, classify_supported};
use super::identifier::extract_identifier;
use super::metadata::MetadataResolver;
use super::scraper::{MAX_IFRAME_DEPTH, PageScraper};
use super::short_link::ShortLinkExpander;
use super::{ResolveError, ResolveStrategy, ResolvedFile, ShareTarget};

/// A step in a resolution plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Shares metadata lookup.
    Metadata,
    /// Headless browser render.
    Browser,
    /// Page scrape with mutation checks and iframes.
    PageScrape,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Metadata => "metadata",
            Self::Browser => "browser",
            Self::PageScrape => "page-scrape",
        };
        f.write_str(label)
    }
}

/// Returns the ordered strategies to try for a link.
///
/// Consumer and short links go metadata (when an identifier exists), then
/// browser, then page scrape. SharePoint links go page scrape, then browser.
/// Unsupported links get an empty plan.
#[must_use]
pub fn plan_strategies(
    kind: LinkKind,
    has_identifier: bool,
    browser_available: bool,
) -> Vec<StrategyKind> {
    let mut plan = Vec::with_capacity(3);
    match kind {
        LinkKind::ConsumerLive | LinkKind::ShortLink => {
            if has_identifier {
                plan.push(StrategyKind::Metadata);
            }
            if browser_available {
                plan.push(StrategyKind::Browser);
            }
            plan.push(StrategyKind::PageScrape);
        }
        LinkKind::SharePoint => {
            plan.push(StrategyKind::PageScrape);
            if browser_available {
                plan.push(StrategyKind::Browser);
            }
        }
        LinkKind::Unsupported => {}
    }
    plan
}

/// Resolves share links by planning and running strategies in order.
pub struct LinkResolver {
    expander: ShortLinkExpander,
    metadata: Box<dyn ResolveStrategy>,
    scraper: Box<dyn ResolveStrategy>,
    browser: BrowserCapability,
}

impl LinkResolver {
    /// Creates a resolver with the default strategies.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Setup`] when an HTTP client cannot be built.
    pub fn new(settings: &HttpSettings, browser: BrowserCapability) -> Result<Self, ResolveError> {
        Self::with_iframe_depth(settings, browser, MAX_IFRAME_DEPTH)
    }

    /// Like [`LinkResolver::new`], with a custom limit on nested iframes
    /// followed by the page scrape.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Setup`] when an HTTP client cannot be built.
    pub fn with_iframe_depth(
        settings: &HttpSettings,
        browser: BrowserCapability,
        max_iframe_depth: usize,
    ) -> Result<Self, ResolveError> {
        Ok(Self::with_strategies(
            ShortLinkExpander::new(settings)?,
            Box::new(MetadataResolver::new(settings)?),
            Box::new(PageScraper::new(settings)?.with_max_iframe_depth(max_iframe_depth)),
            browser,
        ))
    }

    /// Creates a resolver from explicit strategies.
    #[must_use]
    pub fn with_strategies(
        expander: ShortLinkExpander,
        metadata: Box<dyn ResolveStrategy>,
        scraper: Box<dyn ResolveStrategy>,
        browser: BrowserCapability,
    ) -> Self {
        if let BrowserCapability::Unavailable { reason } = &browser {
            debug!(reason = %reason, "browser strategy omitted");
        }
        Self {
            expander,
            metadata,
            scraper,
            browser,
        }
    }

    /// Returns true when the browser strategy takes part in plans.
    #[must_use]
    pub fn browser_available(&self) -> bool {
        self.browser.is_available()
    }

    /// Classifies and resolves a share link.
    ///
    /// Unsupported links fail before any network request.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Unsupported`] for unrecognized hosts,
    /// [`ResolveError::Transport`] when short-link expansion fails, and
    /// [`ResolveError::Exhausted`] when every planned strategy fails.
    #[instrument(skip(self))]
    pub async fn resolve(&self, url: &str) -> Result<ResolvedFile, ResolveError> {
        let url = url.trim();
        let kind = classify_supported(url)?;
        self.resolve_as(url, kind).await
    }

    /// Resolves `url` as a link of the given kind, skipping classification.
    ///
    /// # Errors
    ///
    /// Same as [`LinkResolver::resolve`].
    #[instrument(skip(self), fields(kind = %kind))]
    pub async fn resolve_as(&self, url: &str, kind: LinkKind) -> Result<ResolvedFile, ResolveError> {
        let target = self.share_target(url, kind).await?;
        self.run_plan(&target).await
    }

    /// Expands short links and extracts the identifier where relevant.
    async fn share_target(&self, url: &str, kind: LinkKind) -> Result<ShareTarget, ResolveError> {
        let (expanded_url, identifier) = match kind {
            LinkKind::Unsupported => return Err(ResolveError::unsupported(url)),
            LinkKind::SharePoint => (url.to_string(), None),
            LinkKind::ShortLink => {
                let expanded = self.expander.expand(url).await?;
                let identifier = extract_identifier(&expanded, url);
                (expanded, identifier)
            }
            LinkKind::ConsumerLive => (url.to_string(), extract_identifier(url, url)),
        };
        match &identifier {
            Some(id) => debug!(identifier = %id.value, rule = %id.rule, "identifier extracted"),
            None if kind != LinkKind::SharePoint => {
                debug!("no identifier found, metadata lookup skipped");
            }
            None => {}
        }
        Ok(ShareTarget {
            original_url: url.to_string(),
            expanded_url,
            kind,
            identifier,
        })
    }

    fn strategy(&self, kind: StrategyKind) -> Option<&dyn ResolveStrategy> {
        match kind {
            StrategyKind::Metadata => Some(self.metadata.as_ref()),
            StrategyKind::PageScrape => Some(self.scraper.as_ref()),
            StrategyKind::Browser => self.browser.strategy(),
        }
    }

    async fn run_plan(&self, target: &ShareTarget) -> Result<ResolvedFile, ResolveError> {
        let plan = plan_strategies(
            target.kind,
            target.identifier.is_some(),
            self.browser_available(),
        );
        debug!(plan = ?plan, "resolution plan");

        let mut attempted: Vec<String> = Vec::with_capacity(plan.len());
        let mut last_error: Option<ResolveError> = None;

        for step in plan {
            let Some(strategy) = self.strategy(step) else {
                continue;
            };
            attempted.push(strategy.name().to_string());
            debug!(strategy = strategy.name(), "trying strategy");

            match strategy.resolve(target).await {
                Ok(file) => {
                    info!(
                        strategy = strategy.name(),
                        name = %file.name,
                        source = %file.source,
                        "link resolved"
                    );
                    return Ok(file);
                }
                Err(err) => {
                    debug!(strategy = strategy.name(), error = %err, "strategy failed, trying next");
                    last_error = Some(err);
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| {
            ResolveError::extraction(
                &target.original_url,
                "download URL",
                "no strategy applicable",
            )
        });
        Err(ResolveError::exhausted(
            &target.original_url,
            attempted,
            &last_error,
        ))
    }
}

impl fmt::Debug for LinkResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkResolver")
            .field("metadata", &self.metadata.name())
            .field("scraper", &self.scraper.name())
            .field("browser", &self.browser)
            .finish_non_exhaustive()
    }
}
