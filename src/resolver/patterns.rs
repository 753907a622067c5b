//! Declarative pattern tables for share-page scraping.
//!
//! Each table is an ordered list of named regex rules evaluated
//! first-match-wins. New page layouts are handled by adding rows here; the
//! scraper's control flow does not change.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::utils::{absolutize_url, append_query_flag, compile_static_regex, has_query_flag};

/// Name used when no filename can be recovered from the page or URL.
pub const PLACEHOLDER_NAME: &str = "downloaded_file";

/// Page titles that start with these are site branding, not filenames.
pub const GENERIC_NAME_PREFIXES: &[&str] = &["Microsoft", "OneDrive", "Shared"];

/// Site suffixes stripped from recovered names.
pub const SITE_SUFFIXES: &[&str] = &["- OneDrive", "| Microsoft"];

/// A named regex whose first capture group is the extracted value.
#[derive(Debug)]
pub struct PatternRule {
    /// Stable rule name, used in logs.
    pub name: &'static str,
    /// Pattern with one capture group.
    pub regex: Regex,
}

fn rule(name: &'static str, pattern: &str) -> PatternRule {
    PatternRule {
        name,
        regex: compile_static_regex(pattern),
    }
}

/// Filename rules, most specific first.
pub static FILENAME_RULES: LazyLock<Vec<PatternRule>> = LazyLock::new(|| {
    vec![
        rule("json-name", r#""name"\s*:\s*"([^"]+)""#),
        rule("json-file-name", r#""fileName"\s*:\s*"([^"]+)""#),
        rule("json-title", r#""title"\s*:\s*"([^"]+)""#),
        rule("json-display-name", r#""displayName"\s*:\s*"([^"]+)""#),
        rule("html-title", r"(?is)<title[^>]*>([^<]+)</title>"),
        rule("data-filename", r#"(?i)data-filename\s*=\s*["']([^"']+)["']"#),
    ]
});

/// Download URL rules. The Graph download field is authoritative and must
/// stay ahead of the generic `href` rule.
pub static DOWNLOAD_URL_RULES: LazyLock<Vec<PatternRule>> = LazyLock::new(|| {
    vec![
        rule(
            "graph-download-url",
            r#""@microsoft\.graph\.downloadUrl"\s*:\s*"([^"]+)""#,
        ),
        rule("json-download-url", r#""downloadUrl"\s*:\s*"([^"]+)""#),
        rule(
            "content-download-url",
            r#""@content\.downloadUrl"\s*:\s*"([^"]+)""#,
        ),
        rule("href-download", r#"(?i)href\s*=\s*"([^"]*download[^"]*)""#),
        rule("json-url-download", r#""url"\s*:\s*"([^"]*download[^"]*)""#),
    ]
});

static IFRAME_SRC_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"(?is)<iframe\b[^>]*?\ssrc\s*=\s*["']([^"']+)["']"#));
static HTML_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"&(#[0-9]{1,7}|#[xX][0-9A-Fa-f]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});"));
static URL_FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"/([^/?#]+\.[A-Za-z0-9]{1,10})\?"));

/// A value extracted by a named rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// The rule that matched.
    pub rule: &'static str,
    /// The cleaned value.
    pub value: String,
}

/// Reverses the JSON and HTML escaping commonly found in embedded payloads.
///
/// Entities are decoded in a single pass, so `&amp;lt;` becomes `&lt;`.
#[must_use]
pub fn unescape_embedded(value: &str) -> String {
    let json_unescaped = value.replace("\\u0026", "&").replace("\\/", "/");
    decode_html_entities(&json_unescaped)
}

/// Decodes named (`&quot;`), decimal (`&#39;`) and hex (`&#x27;`) entities.
/// Unknown names and invalid code points are left as written.
#[must_use]
pub fn decode_html_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    HTML_ENTITY_RE
        .replace_all(value, |caps: &regex::Captures<'_>| {
            let whole = &caps[0];
            let body = &caps[1];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(decimal) = body.strip_prefix('#') {
                decimal.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(body)
            };
            decoded.map_or_else(|| whole.to_string(), String::from)
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "hellip" => '\u{2026}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        _ => return None,
    };
    Some(c)
}

/// Returns true when `name` starts with a branding prefix.
#[must_use]
pub fn is_generic_name(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty()
        || GENERIC_NAME_PREFIXES
            .iter()
            .any(|prefix| trimmed.starts_with(prefix))
}

/// Strips trailing site suffixes such as `- OneDrive`.
#[must_use]
pub fn strip_site_suffix(name: &str) -> String {
    let mut cleaned = name.trim();
    for suffix in SITE_SUFFIXES {
        if let Some(stripped) = cleaned.strip_suffix(suffix) {
            cleaned = stripped.trim_end();
        }
    }
    cleaned.to_string()
}

/// Finds the first non-generic filename in `html`.
#[must_use]
pub fn extract_filename(html: &str) -> Option<PatternMatch> {
    FILENAME_RULES.iter().find_map(|rule| {
        rule.regex.captures_iter(html).find_map(|caps| {
            let raw = caps.get(1)?.as_str();
            let value = strip_site_suffix(&unescape_embedded(raw));
            (!is_generic_name(&value)).then_some(PatternMatch {
                rule: rule.name,
                value,
            })
        })
    })
}

/// Lifts a filename-like path segment sitting right before `?` in `url`.
#[must_use]
pub fn filename_from_url(url: &str) -> Option<String> {
    let caps = URL_FILENAME_RE.captures(url)?;
    let raw = caps.get(1)?.as_str();
    let decoded = urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |d| d.into_owned());
    (!decoded.trim().is_empty()).then_some(decoded)
}

/// Picks the best available name: page content, then URL, then placeholder.
#[must_use]
pub fn choose_filename(html: &str, page_url: &str) -> String {
    extract_filename(html)
        .map(|m| m.value)
        .or_else(|| filename_from_url(page_url))
        .unwrap_or_else(|| PLACEHOLDER_NAME.to_string())
}

/// Finds the first download URL in `html`, absolutized against `page_url`.
#[must_use]
pub fn extract_download_url(html: &str, page_url: &Url) -> Option<PatternMatch> {
    DOWNLOAD_URL_RULES.iter().find_map(|rule| {
        rule.regex.captures_iter(html).find_map(|caps| {
            let raw = unescape_embedded(caps.get(1)?.as_str());
            let value = absolutize_url(raw.trim(), page_url)?;
            Some(PatternMatch {
                rule: rule.name,
                value,
            })
        })
    })
}

/// Returns the first `<iframe src>` in `html`, absolutized against `page_url`.
#[must_use]
pub fn extract_iframe_src(html: &str, page_url: &Url) -> Option<String> {
    let caps = IFRAME_SRC_RE.captures(html)?;
    let raw = unescape_embedded(caps.get(1)?.as_str());
    absolutize_url(raw.trim(), page_url)
}

/// Candidate direct-download URLs derived by mutating the share URL.
///
/// Order: `download=1`, `dl=1`, then `/redir` or `/embed` rewritten to
/// `/download`. Candidates identical to the input are dropped.
#[must_use]
pub fn mutation_candidates(url: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    for flag in ["download=1", "dl=1"] {
        if !has_query_flag(url, flag) {
            candidates.push(append_query_flag(url, flag));
        }
    }
    for segment in ["/redir", "/embed"] {
        if let Some(rewritten) = rewrite_path_segment(url, segment, "/download") {
            candidates.push(rewritten);
        }
    }
    candidates.retain(|candidate| candidate != url);
    candidates.dedup();
    candidates
}

fn rewrite_path_segment(url: &str, from: &str, to: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    let path = parsed.path().to_string();
    let is_segment = path == from
        || path.starts_with(&format!("{from}/"))
        || path.contains(&format!("{from}/"))
        || path.ends_with(from);
    if !is_segment {
        return None;
    }
    let rewritten = path.replacen(from, to, 1);
    parsed.set_path(&rewritten);
    Some(parsed.to_string())
}
