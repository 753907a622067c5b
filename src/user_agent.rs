//! Shared User-Agent strings for resolver and transfer HTTP clients.
//!
//! Share pages serve a stripped-down (or empty) document to clients that do not
//! look like a desktop browser, so every request goes out with a browser UA.

/// Browser User-Agent sent on every share-page, metadata, and download request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Default User-Agent used when no override is configured.
#[must_use]
pub fn default_user_agent() -> String {
    BROWSER_USER_AGENT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_user_agent_looks_like_a_browser() {
        let ua = default_user_agent();
        assert!(ua.starts_with("Mozilla/5.0"), "UA must be browser-like: {ua}");
        assert!(ua.contains("Chrome/"), "UA must name a Chrome build: {ua}");
    }
}
