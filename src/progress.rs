//! Progress events and sinks.
//!
//! The scanner and the deduplication engine report progress through an
//! injected [`ProgressSink`] rather than writing to the terminal themselves.
//! The CLI supplies a stderr sink; tests supply recording sinks. Sinks are
//! called from worker threads and must marshal to a UI thread themselves if
//! they need one. Components never call a sink while holding an internal
//! lock.

use std::path::PathBuf;

/// How many scanned files between two `ScanProgress` events. Emission is
/// amortized by a counter-mod check, not a timer, which keeps the event rate
/// well under ~50/s even on fast filesystems.
pub const SCAN_PROGRESS_INTERVAL: u64 = 1024;

/// A progress event from the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Running file count from the scanner.
    ScanProgress { files_seen: u64 },
    /// Per-stage hashing progress.
    StageProgress {
        stage: &'static str,
        done: usize,
        total: usize,
    },
    /// A single-path problem that did not stop the run.
    Warning { path: PathBuf, message: String },
    /// The pipeline finished (possibly partially, on cancellation).
    Done { summary: RunSummary },
}

/// Final counters reported with [`ProgressEvent::Done`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Files the scanner emitted.
    pub files_scanned: usize,
    /// Duplicate groups in the result.
    pub groups: usize,
    /// Members across all groups.
    pub duplicate_files: usize,
    /// Bytes freed if all but one member of every group were removed.
    pub recoverable_bytes: u64,
}

/// Receiver for progress events. Must be callable from any worker thread.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Sink that discards every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Recording sink used by module tests across the crate.
    #[derive(Default)]
    pub struct RecordingSink(pub Mutex<Vec<ProgressEvent>>);

    impl ProgressSink for RecordingSink {
        fn emit(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn test_null_sink_accepts_events() {
        let sink = NullSink;
        sink.emit(ProgressEvent::ScanProgress { files_seen: 1 });
        sink.emit(ProgressEvent::Done {
            summary: RunSummary::default(),
        });
    }

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::default();
        sink.emit(ProgressEvent::ScanProgress { files_seen: 1 });
        sink.emit(ProgressEvent::ScanProgress { files_seen: 2 });
        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ProgressEvent::ScanProgress { files_seen: 1 });
    }
}
