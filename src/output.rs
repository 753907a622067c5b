//! Terminal output: progress bars and result summaries.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use onedrive_r2_core::pipeline::{BatchSummary, LinkOutcome, LinkReport};
use onedrive_r2_core::progress::{
    ProgressObserver, TracingProgress, TransferPhase, TransferProgress,
};

const BAR_TEMPLATE: &str =
    "{msg:>9} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{spinner} {msg:>9} {bytes} ({bytes_per_sec})";

/// Progress observer drawing one indicatif bar per transfer phase.
#[derive(Debug)]
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        let bar = ProgressBar::hidden();
        bar.set_draw_target(ProgressDrawTarget::stderr());
        Self { bar }
    }
}

fn phase_label(phase: TransferPhase) -> &'static str {
    match phase {
        TransferPhase::Download => "download",
        TransferPhase::Upload => "upload",
    }
}

impl ProgressObserver for BarProgress {
    fn on_start(&self, phase: TransferPhase, total_bytes: Option<u64>) {
        self.bar.reset();
        match total_bytes.filter(|total| *total > 0) {
            Some(total) => {
                self.bar.set_length(total);
                self.bar.set_style(
                    ProgressStyle::with_template(BAR_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
            }
            None => {
                self.bar.set_style(
                    ProgressStyle::with_template(SPINNER_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
            }
        }
        self.bar.set_message(phase_label(phase));
    }

    fn on_progress(&self, progress: &TransferProgress) {
        self.bar.set_position(progress.bytes_transferred);
    }

    fn on_finish(&self, _phase: TransferPhase) {
        self.bar.finish_and_clear();
    }
}

/// Returns the observer for this run: bars when enabled, trace events otherwise.
pub fn progress_observer(show_bars: bool) -> Box<dyn ProgressObserver> {
    if show_bars {
        Box::new(BarProgress::new())
    } else {
        Box::new(TracingProgress)
    }
}

/// One-line description of an uploaded link.
#[must_use]
pub fn format_report(report: &LinkReport) -> String {
    format!(
        "Uploaded {} -> s3://{}/{} ({} bytes, via {})",
        report.file_name, report.bucket, report.key, report.bytes, report.source
    )
}

/// Summary lines for a batch: totals, then one line per failure.
#[must_use]
pub fn format_summary(summary: &BatchSummary) -> Vec<String> {
    let mut lines = vec![
        format!("Total: {}", summary.total()),
        format!("Successful: {}", summary.succeeded()),
        format!("Failed: {}", summary.failed()),
    ];
    for outcome in summary.outcomes() {
        if let LinkOutcome::Failed { url, stage, error } = outcome {
            let first_line = error.lines().next().unwrap_or_default();
            lines.push(format!("  [{stage}] {url}: {first_line}"));
        }
    }
    lines
}
