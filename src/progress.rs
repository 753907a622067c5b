//! Transfer progress reporting shared by the download and upload stages.

use tracing::trace;

/// Which leg of the transfer is reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    /// Streaming the file from the share to local disk.
    Download,
    /// Streaming the local file to the object store.
    Upload,
}

/// A single progress update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Reporting phase.
    pub phase: TransferPhase,
    /// Bytes moved so far in this phase.
    pub bytes_transferred: u64,
    /// Total size when known.
    pub total_bytes: Option<u64>,
    /// Bytes moved since the previous update.
    pub delta: u64,
}

impl TransferProgress {
    /// Completion ratio in `[0, 1]`, when the total is known and non-zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> Option<f64> {
        self.total_bytes
            .filter(|total| *total > 0)
            .map(|total| (self.bytes_transferred as f64 / total as f64).min(1.0))
    }
}

/// Receives transfer progress updates.
pub trait ProgressObserver: Send + Sync {
    /// Called when a transfer phase begins.
    fn on_start(&self, phase: TransferPhase, total_bytes: Option<u64>) {
        let _ = (phase, total_bytes);
    }

    /// Called after each chunk or part.
    fn on_progress(&self, progress: &TransferProgress);

    /// Called when a phase ends, successfully or not.
    fn on_finish(&self, phase: TransferPhase) {
        let _ = phase;
    }
}

/// Observer that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgress;

impl ProgressObserver for NoOpProgress {
    fn on_progress(&self, _progress: &TransferProgress) {}
}

/// Observer that emits updates as trace events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressObserver for TracingProgress {
    fn on_progress(&self, progress: &TransferProgress) {
        trace!(
            phase = ?progress.phase,
            bytes = progress.bytes_transferred,
            total = ?progress.total_bytes,
            fraction = ?progress.fraction(),
            "transfer progress"
        );
    }
}

/// Observer backed by a closure.
pub struct FnProgress<F> {
    callback: F,
}

impl<F> ProgressObserver for FnProgress<F>
where
    F: Fn(&TransferProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &TransferProgress) {
        (self.callback)(progress);
    }
}

/// Wraps a closure as a [`ProgressObserver`].
pub fn progress_fn<F>(callback: F) -> FnProgress<F>
where
    F: Fn(&TransferProgress) + Send + Sync,
{
    FnProgress { callback }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    fn update(bytes: u64, total: Option<u64>) -> TransferProgress {
        TransferProgress {
            phase: TransferPhase::Download,
            bytes_transferred: bytes,
            total_bytes: total,
            delta: bytes,
        }
    }

    #[test]
    fn test_fraction_known_total() {
        assert_eq!(update(50, Some(200)).fraction(), Some(0.25));
    }

    #[test]
    fn test_fraction_unknown_or_zero_total() {
        assert_eq!(update(50, None).fraction(), None);
        assert_eq!(update(50, Some(0)).fraction(), None);
    }

    #[test]
    fn test_fraction_clamps_when_total_understated() {
        assert_eq!(update(300, Some(200)).fraction(), Some(1.0));
    }

    #[test]
    fn test_progress_fn_sees_every_update() {
        let seen = Arc::new(AtomicU64::new(0));
        let seen_clone = Arc::clone(&seen);
        let observer = progress_fn(move |p: &TransferProgress| {
            seen_clone.fetch_add(p.delta, Ordering::SeqCst);
        });
        observer.on_start(TransferPhase::Upload, Some(10));
        observer.on_progress(&update(4, Some(10)));
        observer.on_progress(&update(6, Some(10)));
        observer.on_finish(TransferPhase::Upload);
        assert_eq!(seen.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_noop_progress_accepts_updates() {
        NoOpProgress.on_progress(&update(1, None));
    }

    #[test]
    fn test_tracing_progress_handles_known_and_unknown_totals() {
        TracingProgress.on_progress(&update(5, Some(10)));
        TracingProgress.on_progress(&update(5, None));
    }
}
