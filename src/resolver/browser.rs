//! Headless-browser resolution, used when a share page only reveals its
//! download link after client-side rendering.
//!
//! Availability is decided once by [`BrowserCapability::detect`]; an
//! unavailable browser simply drops out of the strategy plan.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::user_agent::BROWSER_USER_AGENT;

use super::patterns::{PLACEHOLDER_NAME, is_generic_name, strip_site_suffix, unescape_embedded};
use super::utils::{absolutize_url, append_query_flag, has_query_flag};
use super::{ResolveError, ResolveStrategy, ResolutionSource, ResolvedFile, ShareTarget};

/// Download link or button candidates, first match wins.
pub const DOWNLOAD_SELECTORS: &[&str] = &[
    r#"button[data-automationid="download"]"#,
    r#"a[data-automationid="download"]"#,
    r#"button[name="Download"]"#,
    r#"[aria-label^="Download"]"#,
    "a[download]",
    r#"a[href*="download"]"#,
];

/// Filename display candidates, first match wins.
pub const FILENAME_SELECTORS: &[&str] = &[
    r#"[data-automationid="FileName"]"#,
    r#"[data-automationid="fileTitle"]"#,
    ".od-ItemName",
    ".OneUp-fileName",
    "h1",
];

/// Script payload fields that carry a download URL.
const PAYLOAD_URL_FIELDS: &[&str] = &[
    "@microsoft.graph.downloadUrl",
    "downloadUrl",
    "@content.downloadUrl",
];

const DOM_SCAN_TEMPLATE: &str = r##"(() => {
  const downloadSelectors = __DOWNLOAD_SELECTORS__;
  const filenameSelectors = __FILENAME_SELECTORS__;
  const urlFields = __URL_FIELDS__;
  const pick = (selectors) => {
    for (const selector of selectors) {
      try {
        const el = document.querySelector(selector);
        if (el) return el;
      } catch (e) {}
    }
    return null;
  };
  const control = pick(downloadSelectors);
  const href = control ? (control.href || control.getAttribute('href') || null) : null;
  const nameEl = pick(filenameSelectors);
  const filename = nameEl ? ((nameEl.textContent || '').trim() || null) : null;
  let payload = null;
  for (const script of document.querySelectorAll('script')) {
    const text = script.textContent || '';
    const nameMatch = text.match(/"name"\s*:\s*"([^"]+)"/);
    if (!nameMatch) continue;
    for (const field of urlFields) {
      const pattern = new RegExp('"' + field.replace(/\./g, '\\.') + '"\\s*:\\s*"([^"]+)"');
      const urlMatch = text.match(pattern);
      if (urlMatch) {
        payload = { name: nameMatch[1], download_url: urlMatch[1] };
        break;
      }
    }
    if (payload) break;
  }
  return {
    download_href: href,
    filename_text: filename,
    script_payload: payload,
    has_download_control: control !== null
  };
})()"##;

/// Builds the DOM scan script from the selector tables.
#[must_use]
pub fn dom_scan_script() -> String {
    let encode = |items: &[&str]| serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string());
    DOM_SCAN_TEMPLATE
        .replace("__DOWNLOAD_SELECTORS__", &encode(DOWNLOAD_SELECTORS))
        .replace("__FILENAME_SELECTORS__", &encode(FILENAME_SELECTORS))
        .replace("__URL_FIELDS__", &encode(PAYLOAD_URL_FIELDS))
}

/// Tunables for a browser session.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Explicit Chromium binary; autodetected when `None`.
    pub executable: Option<PathBuf>,
    /// Pause after navigation so client-side rendering can finish.
    pub settle_delay: Duration,
    /// Pause after clicking a download control.
    pub click_wait: Duration,
    /// Upper bound on launch plus page inspection.
    pub session_timeout: Duration,
    /// Time allowed for each shutdown step before the process is killed.
    pub shutdown_grace: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            settle_delay: Duration::from_secs(3),
            click_wait: Duration::from_secs(2),
            session_timeout: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl BrowserSettings {
    fn config(&self) -> Result<BrowserConfig, String> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--incognito")
            .arg(format!("--user-agent={BROWSER_USER_AGENT}"))
            .launch_timeout(self.session_timeout);
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        builder.build()
    }
}

/// Inline script payload carrying both a name and a download URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScriptPayload {
    /// Filename from the payload.
    pub name: String,
    /// Download URL from the payload (still escaped).
    pub download_url: String,
}

/// What the DOM scan script reports about a rendered page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DomScan {
    /// `href` of the first matching download control.
    pub download_href: Option<String>,
    /// Text of the first matching filename element.
    pub filename_text: Option<String>,
    /// First inline script payload with name and download URL.
    pub script_payload: Option<ScriptPayload>,
    /// Whether any download control exists at all.
    pub has_download_control: bool,
}

/// Next step after a DOM scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanDecision {
    /// A download URL was found.
    Resolved {
        /// Best filename available.
        name: String,
        /// Raw (possibly relative) download URL.
        download_url: String,
    },
    /// No URL, but a control can be clicked.
    ClickControl {
        /// Best filename available.
        name: String,
    },
    /// Nothing usable on the page.
    NothingFound,
}

/// Decides how to proceed from a scan. Script payloads beat selectors.
#[must_use]
pub fn decide_scan(scan: &DomScan) -> ScanDecision {
    if let Some(payload) = &scan.script_payload
        && !payload.download_url.is_empty()
    {
        return ScanDecision::Resolved {
            name: clean_name(Some(&payload.name)),
            download_url: unescape_embedded(&payload.download_url),
        };
    }
    let name = clean_name(scan.filename_text.as_deref());
    if let Some(href) = scan.download_href.as_deref().filter(|h| !h.trim().is_empty()) {
        return ScanDecision::Resolved {
            name,
            download_url: unescape_embedded(href.trim()),
        };
    }
    if scan.has_download_control {
        return ScanDecision::ClickControl { name };
    }
    ScanDecision::NothingFound
}

fn clean_name(raw: Option<&str>) -> String {
    raw.map(|name| strip_site_suffix(&unescape_embedded(name)))
        .filter(|name| !is_generic_name(name))
        .unwrap_or_else(|| PLACEHOLDER_NAME.to_string())
}

/// Resolves links by rendering them in headless Chromium.
#[derive(Debug, Clone)]
pub struct BrowserResolver {
    settings: BrowserSettings,
}

impl BrowserResolver {
    /// Creates a resolver; does not launch anything yet.
    #[must_use]
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    /// Runs one bounded browser session against `url`.
    ///
    /// Launch and inspection share `session_timeout`. Shutdown is bounded by
    /// `shutdown_grace` per step and falls back to killing the process, so
    /// the call returns within `session_timeout + 3 * shutdown_grace`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Browser`] for launch, navigation, evaluation,
    /// or timeout failures and [`ResolveError::Extraction`] when the page
    /// has no download control.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn render(&self, url: &str) -> Result<ResolvedFile, ResolveError> {
        let config = self
            .settings
            .config()
            .map_err(ResolveError::browser_unavailable)?;
        let deadline = Instant::now() + self.settings.session_timeout;

        let (mut browser, mut handler) = match timeout_at(deadline, Browser::launch(config)).await
        {
            Ok(Ok(launched)) => launched,
            Ok(Err(e)) => return Err(ResolveError::browser(url, format!("launch failed: {e}"))),
            Err(_) => return Err(self.timed_out(url, "launch")),
        };

        let handler_task = tokio::spawn(async move {
            while handler.next().await.is_some() {}
        });

        let outcome = timeout_at(deadline, self.inspect(&browser, url)).await;

        shutdown(&mut browser, self.settings.shutdown_grace).await;
        handler_task.abort();

        outcome.unwrap_or_else(|_| Err(self.timed_out(url, "inspection")))
    }

    fn timed_out(&self, url: &str, stage: &str) -> ResolveError {
        ResolveError::browser(
            url,
            format!(
                "session timed out during {stage} after {}s",
                self.settings.session_timeout.as_secs()
            ),
        )
    }

    async fn inspect(&self, browser: &Browser, url: &str) -> Result<ResolvedFile, ResolveError> {
        let to_err =
            |stage: &str, e: &dyn fmt::Display| ResolveError::browser(url, format!("{stage}: {e}"));

        let page = browser
            .new_page(url)
            .await
            .map_err(|e| to_err("open page", &e))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| to_err("navigation", &e))?;
        tokio::time::sleep(self.settings.settle_delay).await;

        let scan: DomScan = page
            .evaluate(dom_scan_script().as_str())
            .await
            .map_err(|e| to_err("evaluate", &e))?
            .into_value()
            .map_err(|e| to_err("scan result", &e))?;
        debug!(?scan, "dom scan");

        let current_url = page
            .url()
            .await
            .map_err(|e| to_err("page url", &e))?
            .unwrap_or_else(|| url.to_string());

        match decide_scan(&scan) {
            ScanDecision::Resolved { name, download_url } => {
                let base = Url::parse(&current_url).map_err(|e| to_err("page url", &e))?;
                let download_url = absolutize_url(&download_url, &base).ok_or_else(|| {
                    ResolveError::extraction(url, "download URL", "relative URL could not be joined")
                })?;
                Ok(ResolvedFile {
                    name,
                    download_url,
                    size_bytes: 0,
                    source: ResolutionSource::Browser,
                })
            }
            ScanDecision::ClickControl { name } => {
                let mut clicked = false;
                for selector in DOWNLOAD_SELECTORS {
                    if let Ok(element) = page.find_element(*selector).await {
                        element.click().await.map_err(|e| to_err("click", &e))?;
                        clicked = true;
                        break;
                    }
                }
                if !clicked {
                    warn!("download control vanished before click");
                }
                tokio::time::sleep(self.settings.click_wait).await;
                let after_click = page
                    .url()
                    .await
                    .map_err(|e| to_err("page url", &e))?
                    .unwrap_or(current_url);
                let download_url = if has_query_flag(&after_click, "download=1") {
                    after_click
                } else {
                    append_query_flag(&after_click, "download=1")
                };
                Ok(ResolvedFile {
                    name,
                    download_url,
                    size_bytes: 0,
                    source: ResolutionSource::Browser,
                })
            }
            ScanDecision::NothingFound => Err(ResolveError::extraction(
                url,
                "download URL",
                "rendered page has no download control",
            )),
        }
    }
}

/// Closes the browser, killing the process when it does not exit in time.
async fn shutdown(browser: &mut Browser, grace: Duration) {
    let closed = match timeout(grace, browser.close()).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!(error = %e, "browser close failed");
            false
        }
        Err(_) => {
            debug!("browser close timed out");
            false
        }
    };
    if closed && timeout(grace, browser.wait()).await.is_ok() {
        return;
    }

    warn!("browser did not exit cleanly, killing process");
    if let Some(Err(e)) = browser.kill().await {
        debug!(error = %e, "browser kill failed");
    }
    if timeout(grace, browser.wait()).await.is_err() {
        warn!("browser process still running after kill");
    }
}

#[async_trait]
impl ResolveStrategy for BrowserResolver {
    fn name(&self) -> &str {
        "browser"
    }

    async fn resolve(&self, target: &ShareTarget) -> Result<ResolvedFile, ResolveError> {
        self.render(&target.expanded_url).await
    }
}

/// Whether the browser strategy can run in this process.
pub enum BrowserCapability {
    /// A browser strategy is ready.
    Available(Box<dyn ResolveStrategy>),
    /// No browser; the strategy is left out of every plan.
    Unavailable {
        /// Why the browser cannot be used.
        reason: String,
    },
}

impl BrowserCapability {
    /// Looks for a usable Chromium binary.
    #[must_use]
    pub fn detect(settings: BrowserSettings) -> Self {
        if let Some(path) = &settings.executable
            && !path.exists()
        {
            return Self::unavailable(format!(
                "browser executable not found: {}",
                path.display()
            ));
        }
        match settings.config() {
            Ok(_) => Self::Available(Box::new(BrowserResolver::new(settings))),
            Err(reason) => Self::unavailable(reason),
        }
    }

    /// A capability that is switched off explicitly.
    #[must_use]
    pub fn disabled() -> Self {
        Self::unavailable("browser resolution disabled")
    }

    /// Wraps a custom strategy as the browser capability.
    #[must_use]
    pub fn with_strategy(strategy: Box<dyn ResolveStrategy>) -> Self {
        Self::Available(strategy)
    }

    fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Returns true when a browser strategy is present.
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Returns the browser strategy, if any.
    #[must_use]
    pub fn strategy(&self) -> Option<&dyn ResolveStrategy> {
        match self {
            Self::Available(strategy) => Some(strategy.as_ref()),
            Self::Unavailable { .. } => None,
        }
    }
}

impl fmt::Debug for BrowserCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available(strategy) => f
                .debug_tuple("Available")
                .field(&strategy.name())
                .finish(),
            Self::Unavailable { reason } => f
                .debug_struct("Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}
