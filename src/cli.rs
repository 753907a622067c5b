//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use onedrive_r2_core::http::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS};

const DEFAULT_MAX_IFRAME_DEPTH: u8 = 3;

/// Copy OneDrive and SharePoint shared files into a Cloudflare R2 bucket.
///
/// Object store credentials come from R2_ENDPOINT_URL, R2_ACCESS_KEY_ID,
/// R2_SECRET_ACCESS_KEY and R2_BUCKET_NAME (a .env file is read if present).
#[derive(Parser, Debug)]
#[command(name = "onedrive-r2")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Transfer one share link, or every link in a file
    Run(RunArgs),
}

/// Arguments for `run`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Read share links from this file, one per line (# starts a comment)
    #[arg(short, long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Share link, or the key prefix when --file is given
    #[arg(value_name = "URL")]
    pub first: Option<String>,

    /// Key prefix for uploaded objects
    #[arg(value_name = "PREFIX")]
    pub second: Option<String>,

    /// Never use the headless browser strategy
    #[arg(long)]
    pub no_browser: bool,

    /// Chromium executable for the browser strategy
    #[arg(long, value_name = "PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Connect timeout in seconds (1-300)
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=300))]
    pub connect_timeout: u64,

    /// Read timeout in seconds (1-3600)
    #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: u64,

    /// Nested iframes the page scrape follows (0-8)
    #[arg(long, default_value_t = DEFAULT_MAX_IFRAME_DEPTH, value_parser = clap::value_parser!(u8).range(0..=8))]
    pub max_iframe_depth: u8,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,
}

/// What a `run` invocation operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTarget {
    /// One share link.
    Single {
        /// The share link.
        url: String,
        /// Key prefix (may be empty).
        prefix: String,
    },
    /// A links file.
    Batch {
        /// The links file.
        path: PathBuf,
        /// Key prefix (may be empty).
        prefix: String,
    },
}

impl RunArgs {
    /// Interprets the positional arguments against `--file`.
    ///
    /// # Errors
    ///
    /// Returns a usage message when the combination is invalid.
    pub fn target(&self) -> Result<RunTarget, String> {
        match (&self.file, &self.first, &self.second) {
            (Some(path), prefix, None) => Ok(RunTarget::Batch {
                path: path.clone(),
                prefix: prefix.clone().unwrap_or_default(),
            }),
            (Some(_), Some(_), Some(_)) => Err(
                "with --file, only one positional argument (the key prefix) is accepted"
                    .to_string(),
            ),
            (None, Some(url), prefix) => Ok(RunTarget::Single {
                url: url.clone(),
                prefix: prefix.clone().unwrap_or_default(),
            }),
            (None, None, _) | (Some(_), None, Some(_)) => {
                Err("a share link or --file <PATH> is required".to_string())
            }
        }
    }
}
