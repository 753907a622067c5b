//! Links files and batch bookkeeping.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::LinkReport;

/// The links file could not be read.
#[derive(Debug, Error)]
pub enum LinksFileError {
    /// Opening or reading failed.
    #[error("cannot read links file {path}: {source}")]
    Read {
        /// The links file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Extracts links from a links file body: one per line, blank lines and
/// `#` comments skipped, surrounding whitespace trimmed.
#[must_use]
pub fn parse_links(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Reads and parses a links file.
///
/// # Errors
///
/// Returns [`LinksFileError::Read`] when the file cannot be read as UTF-8 text.
pub fn read_links_file(path: &Path) -> Result<Vec<String>, LinksFileError> {
    let contents = std::fs::read_to_string(path).map_err(|source| LinksFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_links(&contents))
}

/// Result of one link within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The file landed in the object store.
    Succeeded(LinkReport),
    /// The link failed at `stage`.
    Failed {
        /// The share link.
        url: String,
        /// Stage that failed (resolve, download, upload).
        stage: &'static str,
        /// Rendered error.
        error: String,
    },
}

impl LinkOutcome {
    /// Returns true for [`LinkOutcome::Succeeded`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// Per-link outcomes of a batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    outcomes: Vec<LinkOutcome>,
}

impl BatchSummary {
    /// Records an outcome.
    pub fn push(&mut self, outcome: LinkOutcome) {
        self.outcomes.push(outcome);
    }

    /// All outcomes in input order.
    #[must_use]
    pub fn outcomes(&self) -> &[LinkOutcome] {
        &self.outcomes
    }

    /// Number of links attempted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of links uploaded.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of links that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }
}
