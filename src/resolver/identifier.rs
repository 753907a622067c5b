//! Recovery of the share identifier from a (possibly expanded) share URL.
//!
//! The rules live in [`IDENTIFIER_RULES`] and are evaluated strictly in order;
//! the first one producing a non-empty value wins.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::utils::compile_static_regex;

static ID_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"[?&]id=([^&#]+)"));
static LONG_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"[A-Za-z0-9_-]{20,}"));

/// Which extraction rule produced an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierRule {
    /// `resid=` substring up to the next `&`.
    ResidParam,
    /// `resid` from a legacy `/redir?` query string.
    RedirQuery,
    /// `id=` query parameter.
    IdParam,
    /// `/<type>/<type>/<id1>/<id2>` short-link path.
    ShortLinkPath,
    /// First long token anywhere in the URL.
    LongToken,
}

impl fmt::Display for IdentifierRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ResidParam => "resid-param",
            Self::RedirQuery => "redir-query",
            Self::IdParam => "id-param",
            Self::ShortLinkPath => "short-link-path",
            Self::LongToken => "long-token",
        };
        f.write_str(label)
    }
}

/// An extracted share identifier and the rule that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    /// The opaque identifier value.
    pub value: String,
    /// The rule that produced it.
    pub rule: IdentifierRule,
}

type Extractor = fn(expanded: &str, original: &str) -> Option<String>;

/// Ordered identifier rules; first non-empty match wins.
pub const IDENTIFIER_RULES: &[(IdentifierRule, Extractor)] = &[
    (IdentifierRule::ResidParam, resid_param),
    (IdentifierRule::RedirQuery, redir_query),
    (IdentifierRule::IdParam, id_param),
    (IdentifierRule::ShortLinkPath, short_link_path),
    (IdentifierRule::LongToken, long_token),
];

/// Applies [`IDENTIFIER_RULES`] to the expanded URL (and the original URL for
/// the path-based rule). Returns `None` when no rule matches.
#[must_use]
pub fn extract_identifier(expanded: &str, original: &str) -> Option<Identifier> {
    IDENTIFIER_RULES.iter().find_map(|(rule, extractor)| {
        extractor(expanded, original)
            .filter(|value| !value.is_empty())
            .map(|value| Identifier { value, rule: *rule })
    })
}

fn resid_param(expanded: &str, _original: &str) -> Option<String> {
    let (_, rest) = expanded.split_once("resid=")?;
    rest.split('&').next().map(str::to_string)
}

fn redir_query(expanded: &str, _original: &str) -> Option<String> {
    if !expanded.contains("/redir?") {
        return None;
    }
    let parsed = Url::parse(expanded).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "resid")
        .map(|(_, value)| value.into_owned())
}

fn id_param(expanded: &str, _original: &str) -> Option<String> {
    ID_PARAM_RE
        .captures(expanded)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn short_link_path(_expanded: &str, original: &str) -> Option<String> {
    let parsed = Url::parse(original).ok()?;
    let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();
    let [kind, scope, first, second, ..] = segments.as_slice() else {
        return None;
    };
    let is_type_segment =
        |segment: &str| segment.len() <= 2 && segment.chars().all(|c| c.is_ascii_alphabetic());
    if !is_type_segment(kind) || !is_type_segment(scope) {
        return None;
    }
    let combined = format!("{first}!{second}");
    Some(combined.replace('_', "%21").replace('-', "%2D"))
}

fn long_token(expanded: &str, _original: &str) -> Option<String> {
    LONG_TOKEN_RE
        .find(expanded)
        .map(|m| m.as_str().to_string())
}
