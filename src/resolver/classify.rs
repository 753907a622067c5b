//! Host-based routing of share links into resolution families.
//!
//! Classification is pure: it never touches the network, so an unsupported
//! link is rejected before any request goes out.

use std::fmt;

use super::ResolveError;
use super::utils::host_of;

/// Resolution family a share link belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// `onedrive.live.com` style consumer share links.
    ConsumerLive,
    /// `1drv.ms` short links that redirect into a consumer link.
    ShortLink,
    /// `*.sharepoint.com` (OneDrive for Business) links.
    SharePoint,
    /// Anything else.
    Unsupported,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ConsumerLive => "consumer-live",
            Self::ShortLink => "short-link",
            Self::SharePoint => "sharepoint",
            Self::Unsupported => "unsupported",
        };
        f.write_str(label)
    }
}

/// Host fragments in priority order. Short links go first because they
/// redirect into consumer hosts.
const HOST_RULES: &[(&str, LinkKind)] = &[
    ("1drv.ms", LinkKind::ShortLink),
    ("onedrive.live.com", LinkKind::ConsumerLive),
    ("skydrive.live.com", LinkKind::ConsumerLive),
    ("sharepoint.com", LinkKind::SharePoint),
];

/// Classifies a URL by host. Total: unparseable input is `Unsupported`.
#[must_use]
pub fn classify(url: &str) -> LinkKind {
    let Some(host) = host_of(url) else {
        return LinkKind::Unsupported;
    };
    HOST_RULES
        .iter()
        .find(|(fragment, _)| host.contains(fragment))
        .map_or(LinkKind::Unsupported, |(_, kind)| *kind)
}

/// Classifies a URL, turning `Unsupported` into an error.
///
/// # Errors
///
/// Returns [`ResolveError::Unsupported`] for hosts outside the rule table.
pub fn classify_supported(url: &str) -> Result<LinkKind, ResolveError> {
    match classify(url) {
        LinkKind::Unsupported => Err(ResolveError::unsupported(url)),
        kind => Ok(kind),
    }
}
