//! CLI entry point for the OneDrive to R2 transfer tool.

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use onedrive_r2_core::config::{R2Config, load_dotenv};
use onedrive_r2_core::http::HttpSettings;
use onedrive_r2_core::pipeline::{LinkProcessor, read_links_file};
use onedrive_r2_core::resolver::{BrowserCapability, BrowserSettings, LinkResolver};
use onedrive_r2_core::{HttpClient, R2Store};
use tracing::{debug, info, warn};

mod cli;
mod output;

use cli::{Cli, Command, RunArgs, RunTarget};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?cli, "CLI arguments parsed");

    match cli.command {
        Command::Run(args) => run(args, cli.quiet).await,
    }
}

async fn run(args: RunArgs, quiet: bool) -> Result<ExitCode> {
    let target = match args.target() {
        Ok(target) => target,
        Err(message) => Cli::command()
            .error(clap::error::ErrorKind::MissingRequiredArgument, message)
            .exit(),
    };

    load_dotenv();
    let config = R2Config::from_env()?;
    debug!(?config, "object store configured");

    let http = HttpSettings::with_timeouts(args.connect_timeout, args.read_timeout);
    let browser = if args.no_browser {
        BrowserCapability::disabled()
    } else {
        BrowserCapability::detect(BrowserSettings {
            executable: args.chrome_path.clone(),
            ..BrowserSettings::default()
        })
    };
    if let BrowserCapability::Unavailable { reason } = &browser {
        debug!(reason = %reason, "browser strategy unavailable");
    }

    let resolver =
        LinkResolver::with_iframe_depth(&http, browser, usize::from(args.max_iframe_depth))
            .context("failed to build resolver")?;
    let downloader = HttpClient::new(&http).context("failed to build download client")?;
    let store = R2Store::new(&config).await;
    let processor = LinkProcessor::new(resolver, downloader, Box::new(store));

    let show_bars = !args.no_progress && !quiet && io::stderr().is_terminal();
    let progress = output::progress_observer(show_bars);

    match target {
        RunTarget::Single { url, prefix } => {
            match processor.process(&url, &prefix, progress.as_ref()).await {
                Ok(report) => {
                    println!("{}", output::format_report(&report));
                    Ok(ExitCode::SUCCESS)
                }
                Err(error) => {
                    eprintln!("Error [{}]: {error}", error.stage());
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        RunTarget::Batch { path, prefix } => {
            let links = read_links_file(&path)?;
            if links.is_empty() {
                warn!(path = %path.display(), "links file contains no links");
            }
            info!(links = links.len(), "starting batch");

            let summary = processor
                .process_batch(&links, &prefix, progress.as_ref())
                .await;
            for line in output::format_summary(&summary) {
                println!("{line}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
