//! Error types for share-link resolution.
//!
//! Messages follow the What/Why/Fix pattern used across the project.

use thiserror::Error;

/// Errors that can occur while turning a share link into a download URL.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The URL is not a OneDrive, short-link, or SharePoint share link.
    #[error(
        "unsupported share link '{url}': host is not a OneDrive, 1drv.ms, or SharePoint domain\n  Suggestion: Pass an anonymous OneDrive or SharePoint share link"
    )]
    Unsupported {
        /// The rejected URL.
        url: String,
    },

    /// A redirect, fetch, or mutation check request failed or returned an error status.
    #[error("request to '{url}' failed: {reason}")]
    Transport {
        /// The URL that was requested.
        url: String,
        /// What went wrong on the wire.
        reason: String,
    },

    /// A response arrived but nothing useful could be extracted from it.
    #[error("could not extract {what} from '{url}': {reason}")]
    Extraction {
        /// The URL whose content was inspected.
        url: String,
        /// What we were looking for (identifier, download URL, ...).
        what: &'static str,
        /// Why extraction failed.
        reason: String,
    },

    /// Headless browser support is not present in this runtime.
    #[error("browser resolution unavailable: {reason}")]
    BrowserUnavailable {
        /// Why no browser could be used.
        reason: String,
    },

    /// The headless browser failed while rendering or inspecting the page.
    #[error("browser resolution failed for '{url}': {reason}")]
    Browser {
        /// The page being rendered.
        url: String,
        /// The browser-level error.
        reason: String,
    },

    /// HTTP client construction failed.
    #[error("resolver setup failed: {reason}")]
    Setup {
        /// Why the client could not be built.
        reason: String,
    },

    /// Every planned strategy failed.
    #[error(
        "all strategies failed for '{input}' (tried: {})\n  Last error: {last_error}\n  Suggestion: Check that the link is shared anonymously and still valid",
        .attempted.join(", ")
    )]
    Exhausted {
        /// The original share link.
        input: String,
        /// Names of the strategies attempted, in order.
        attempted: Vec<String>,
        /// Message of the final strategy failure.
        last_error: String,
    },
}

impl ResolveError {
    /// Creates an `Unsupported` error.
    #[must_use]
    pub fn unsupported(url: &str) -> Self {
        Self::Unsupported {
            url: url.to_string(),
        }
    }

    /// Creates a `Transport` error.
    #[must_use]
    pub fn transport(url: &str, reason: impl Into<String>) -> Self {
        Self::Transport {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a `Transport` error for a non-success HTTP status.
    #[must_use]
    pub fn http_status(url: &str, status: u16) -> Self {
        Self::transport(url, format!("HTTP {status}"))
    }

    /// Creates an `Extraction` error.
    #[must_use]
    pub fn extraction(url: &str, what: &'static str, reason: impl Into<String>) -> Self {
        Self::Extraction {
            url: url.to_string(),
            what,
            reason: reason.into(),
        }
    }

    /// Creates a `BrowserUnavailable` error.
    #[must_use]
    pub fn browser_unavailable(reason: impl Into<String>) -> Self {
        Self::BrowserUnavailable {
            reason: reason.into(),
        }
    }

    /// Creates a `Browser` error.
    #[must_use]
    pub fn browser(url: &str, reason: impl Into<String>) -> Self {
        Self::Browser {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a `Setup` error.
    #[must_use]
    pub fn setup(reason: impl Into<String>) -> Self {
        Self::Setup {
            reason: reason.into(),
        }
    }

    /// Creates an `Exhausted` error.
    #[must_use]
    pub fn exhausted(input: &str, attempted: Vec<String>, last_error: &ResolveError) -> Self {
        Self::Exhausted {
            input: input.to_string(),
            attempted,
            last_error: last_error.to_string(),
        }
    }

    /// Maps a reqwest send/read error onto a `Transport` error.
    #[must_use]
    pub fn from_reqwest(url: &str, error: &reqwest::Error) -> Self {
        let reason = if error.is_timeout() {
            "request timed out".to_string()
        } else if error.is_redirect() {
            "too many redirects".to_string()
        } else {
            error.to_string()
        };
        Self::transport(url, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_unsupported_message() {
        let err = ResolveError::unsupported("https://example.com/file");
        let msg = err.to_string();
        assert!(msg.contains("example.com"), "should contain url");
        assert!(msg.contains("Suggestion"), "should have suggestion");
    }

    #[test]
    fn test_resolve_error_http_status_message() {
        let err = ResolveError::http_status("https://1drv.ms/u/s!abc", 404);
        assert_eq!(err.to_string(), "request to 'https://1drv.ms/u/s!abc' failed: HTTP 404");
    }

    #[test]
    fn test_resolve_error_extraction_message() {
        let err = ResolveError::extraction("https://x.sharepoint.com/a", "download URL", "no pattern matched");
        let msg = err.to_string();
        assert!(msg.contains("could not extract download URL"));
        assert!(msg.contains("no pattern matched"));
    }

    #[test]
    fn test_resolve_error_exhausted_lists_attempted_strategies() {
        let last = ResolveError::http_status("https://a", 500);
        let err = ResolveError::exhausted(
            "https://onedrive.live.com/?id=1",
            vec!["metadata".to_string(), "page-scrape".to_string()],
            &last,
        );
        let msg = err.to_string();
        assert!(msg.contains("metadata, page-scrape"), "got: {msg}");
        assert!(msg.contains("HTTP 500"), "got: {msg}");
    }

    #[test]
    fn test_resolve_error_clone() {
        let err = ResolveError::browser("https://a", "crashed");
        assert_eq!(err.to_string(), err.clone().to_string());
    }
}
