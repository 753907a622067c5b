//! Filename hygiene for resolved names before they touch the filesystem.
//!
//! Names come from remote pages and metadata, so they are never trusted as
//! paths: separators, reserved characters, and traversal segments are all
//! neutralized.

use std::path::{Component, Path};

/// Used when sanitizing leaves nothing usable.
pub const FALLBACK_FILENAME: &str = "downloaded_file";

/// Longest name kept, in bytes; longer names keep their extension.
pub const MAX_FILENAME_BYTES: usize = 200;

/// Makes a remote-supplied name safe to use as a single path segment.
///
/// Reserved characters and control characters become `_`, surrounding
/// whitespace and dots are trimmed, and names that would still resolve to
/// `.`/`..` or be empty fall back to [`FALLBACK_FILENAME`].
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim().trim_matches('.').trim();

    if trimmed.is_empty() || trimmed.chars().all(|c| c == '_') || !is_single_segment(trimmed) {
        return FALLBACK_FILENAME.to_string();
    }
    truncate_keeping_extension(trimmed, MAX_FILENAME_BYTES)
}

fn is_single_segment(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn truncate_keeping_extension(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(pos) if pos > 0 && name.len() - pos <= 16 => (&name[..pos], &name[pos..]),
        _ => (name, ""),
    };
    let budget = max_bytes.saturating_sub(ext.len());
    let mut cut = budget.min(stem.len());
    while !stem.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{ext}", &stem[..cut])
}
