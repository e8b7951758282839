//! The stage sequencer driving duplicate detection.
//!
//! The orchestrator thread advances the pipeline one stage at a time:
//! every surviving file is hashed for the current stage on a bounded rayon
//! pool, the pool joins, and only then does regrouping happen. Stage N+1
//! never starts for any file while stage N is incomplete for some survivor.
//! Each stage produces a fresh container; nothing is mutated in place while
//! workers run, except the per-file fingerprint slot each work item owns.
//!
//! Cancellation is cooperative: the stop flag is polled before each stage
//! and before each file's work item. A cancelled run returns the groups
//! proven complete up to the last fully-finished stage, marked partial.

use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::hasher::{self, Digest, CHUNK};
use crate::progress::{ProgressEvent, ProgressSink, RunSummary};
use crate::scanner::FileRecord;

use super::{group_by, normalize_filename, sort_groups, Boost, DedupResult, DuplicateGroup, Mode};

/// How often the per-stage progress sink fires: once every
/// `max(1, files_total_in_stage / PROGRESS_STEPS)` completions.
const PROGRESS_STEPS: usize = 200;

/// Engine parameters.
#[derive(Debug, Clone)]
pub struct DedupOptions {
    /// Pipeline depth.
    pub mode: Mode,
    /// Boost key for the no-I/O grouping stage.
    pub boost: Boost,
    /// Worker pool size for the hashing stages.
    pub workers: usize,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            boost: Boost::default(),
            workers: default_workers(),
        }
    }
}

impl DedupOptions {
    /// Set the mode.
    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the boost key.
    #[must_use]
    pub fn with_boost(mut self, boost: Boost) -> Self {
        self.boost = boost;
        self
    }

    /// Set the worker count (clamped to at least 1).
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

/// Default hashing parallelism: one worker per CPU, capped at 8. More
/// rarely helps on spinning disks and contends the page cache on SSDs.
#[must_use]
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        .min(8)
}

/// Failed to construct the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// One hashing round of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HashStage {
    Front,
    Middle,
    End,
    Full,
}

impl HashStage {
    fn name(self) -> &'static str {
        match self {
            HashStage::Front => "front",
            HashStage::Middle => "middle",
            HashStage::End => "end",
            HashStage::Full => "full",
        }
    }

    /// Size at or below which a group skips this round and is confirmed
    /// as-is. The front window covers whole files up to `CHUNK`; the end
    /// round is skipped up to `2 * CHUNK`, where the front and end windows
    /// span the entire file between them.
    fn skip_at_or_below(self, size: u64) -> bool {
        match self {
            HashStage::Front => false,
            HashStage::Middle | HashStage::Full => size <= CHUNK,
            HashStage::End => size <= 2 * CHUNK,
        }
    }

    /// Compute this stage's digest into the record's slot. Slots already
    /// filled (a loaded result, or front==full for small files) are kept.
    fn compute(self, record: &mut FileRecord) -> Result<(), hasher::HashError> {
        let prints = &mut record.prints;
        match self {
            HashStage::Front => {
                if prints.front.is_none() {
                    prints.front = Some(hasher::front(&record.path, record.size)?);
                }
            }
            HashStage::Middle => {
                if prints.middle.is_none() {
                    prints.middle = Some(hasher::middle(&record.path, record.size)?);
                }
            }
            HashStage::End => {
                if prints.end.is_none() {
                    prints.end = Some(hasher::end(&record.path, record.size)?);
                }
            }
            HashStage::Full => {
                if prints.full.is_none() {
                    prints.full = Some(hasher::full(&record.path)?);
                }
            }
        }
        Ok(())
    }

    fn digest_of(self, record: &FileRecord) -> Option<Digest> {
        match self {
            HashStage::Front => record.prints.front,
            HashStage::Middle => record.prints.middle,
            HashStage::End => record.prints.end,
            HashStage::Full => record.prints.full,
        }
    }
}

fn stages_for(mode: Mode) -> &'static [HashStage] {
    match mode {
        Mode::Fast => &[HashStage::Front],
        Mode::Normal => &[HashStage::Front, HashStage::Middle, HashStage::End],
        Mode::Full => &[HashStage::Front, HashStage::Middle, HashStage::Full],
    }
}

/// Multi-stage duplicate detector.
///
/// Owns its worker pool; re-entrant across concurrent scans (no global
/// state, all configuration in [`DedupOptions`]).
pub struct Deduplicator {
    options: DedupOptions,
    pool: rayon::ThreadPool,
}

impl Deduplicator {
    /// Build an engine with its bounded worker pool.
    ///
    /// # Errors
    ///
    /// Fails only if the thread pool cannot be created.
    pub fn new(options: DedupOptions) -> Result<Self, EngineError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers.max(1))
            .build()?;
        Ok(Self { options, pool })
    }

    /// Run the pipeline over scanned records.
    pub fn run(
        &self,
        files: Vec<FileRecord>,
        stop: &AtomicBool,
        sink: &dyn ProgressSink,
    ) -> DedupResult {
        let mode = self.options.mode;
        let files_scanned = files.len();

        let mut pending = self.boost_stage(files, sink);
        let mut confirmed: Vec<DuplicateGroup> = Vec::new();
        let mut partial = false;
        let mut rounds_done = 0usize;

        for &stage in stages_for(mode) {
            if stop.load(Ordering::SeqCst) {
                // Cancelled between rounds: pending holds the output of
                // the last fully-finished round and is proven at that
                // depth. Buckets that never reached a hash round are not.
                if rounds_done == 0 {
                    pending = Vec::new();
                }
                partial = true;
                break;
            }

            // Groups this stage cannot refine are already fully proven.
            let (skip, work): (Vec<_>, Vec<_>) = pending
                .into_iter()
                .partition(|g: &DuplicateGroup| stage.skip_at_or_below(g.size));
            confirmed.extend(skip);

            let (refined, complete) = self.hash_stage(stage, work, stop, sink);
            if !complete {
                // The round was cut short. Its regrouping is unproven,
                // but its input bucketing stands at the depth the earlier
                // rounds established.
                pending = if rounds_done > 0 { refined } else { Vec::new() };
                partial = true;
                break;
            }
            pending = refined;
            rounds_done += 1;
        }

        confirmed.extend(pending);

        sort_groups(&mut confirmed);

        let result = DedupResult {
            groups: confirmed,
            mode,
            boost: self.options.boost,
            partial,
        };

        sink.emit(ProgressEvent::Done {
            summary: RunSummary {
                files_scanned,
                groups: result.groups.len(),
                duplicate_files: result.duplicate_files(),
                recoverable_bytes: result.recoverable_bytes(),
            },
        });

        log::debug!(
            "dedup finished: {} groups, {} files, {} recoverable bytes{}",
            result.groups.len(),
            result.duplicate_files(),
            result.recoverable_bytes(),
            if partial { " (partial)" } else { "" }
        );

        result
    }

    /// Stage 0: bucket by the boost key. Metadata only, no file reads.
    fn boost_stage(&self, files: Vec<FileRecord>, sink: &dyn ProgressSink) -> Vec<DuplicateGroup> {
        let total = files.len();
        let mode = self.options.mode;

        let buckets = match self.options.boost {
            Boost::Size => group_by(files, |r| (r.size, None::<String>)),
            Boost::SizeExt => group_by(files, |r| (r.size, r.extension())),
            Boost::SizeFilename => group_by(files, |r| (r.size, Some(r.basename().to_lowercase()))),
            Boost::SizeFuzzyFilename => {
                group_by(files, |r| (r.size, Some(normalize_filename(&r.basename()))))
            }
        };

        sink.emit(ProgressEvent::StageProgress {
            stage: "boost",
            done: total,
            total,
        });

        buckets
            .into_iter()
            .map(|members| DuplicateGroup {
                size: members[0].size,
                members,
                stage: mode,
            })
            .collect()
    }

    /// One hashing round: compute the stage digest for every member of
    /// every group on the pool, then regroup within each bucket and drop
    /// singletons. Files whose read fails are demoted out of their group.
    ///
    /// Also reports whether the round ran to completion. When the stop
    /// flag cuts it short, the returned groups keep the input bucketing
    /// instead of regrouping, so the caller still holds the grouping the
    /// earlier rounds proved.
    fn hash_stage(
        &self,
        stage: HashStage,
        work: Vec<DuplicateGroup>,
        stop: &AtomicBool,
        sink: &dyn ProgressSink,
    ) -> (Vec<DuplicateGroup>, bool) {
        let mode = self.options.mode;
        let total: usize = work.iter().map(DuplicateGroup::len).sum();
        if total == 0 {
            return (Vec::new(), true);
        }
        let notify_every = (total / PROGRESS_STEPS).max(1);
        let done = AtomicUsize::new(0);
        let cut_short = AtomicBool::new(false);

        let hashed: Vec<(u64, Vec<FileRecord>)> = self.pool.install(|| {
            work.into_par_iter()
                .map(|group| {
                    let size = group.size;
                    let members: Vec<FileRecord> = group
                        .members
                        .into_par_iter()
                        .filter_map(|mut record| {
                            if stop.load(Ordering::SeqCst) {
                                // Skip the remaining work and leave the
                                // record unhashed; the round no longer
                                // counts as finished.
                                cut_short.store(true, Ordering::SeqCst);
                                return Some(record);
                            }
                            match stage.compute(&mut record) {
                                Ok(()) => {
                                    let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                                    if n % notify_every == 0 {
                                        sink.emit(ProgressEvent::StageProgress {
                                            stage: stage.name(),
                                            done: n,
                                            total,
                                        });
                                    }
                                    Some(record)
                                }
                                Err(e) => {
                                    log::warn!("demoting {}: {}", record.path.display(), e);
                                    sink.emit(ProgressEvent::Warning {
                                        path: record.path.clone(),
                                        message: e.to_string(),
                                    });
                                    None
                                }
                            }
                        })
                        .collect();
                    (size, members)
                })
                .collect()
        });

        let complete = !cut_short.load(Ordering::SeqCst);
        let mut refined = Vec::new();
        for (size, members) in hashed {
            if complete {
                for bucket in group_by(members, |r| stage.digest_of(r)) {
                    refined.push(DuplicateGroup {
                        size,
                        members: bucket,
                        stage: mode,
                    });
                }
            } else if members.len() >= 2 {
                refined.push(DuplicateGroup {
                    size,
                    members,
                    stage: mode,
                });
            }
        }
        (refined, complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullSink;
    use std::fs::File;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        File::create(&path).unwrap().write_all(content).unwrap();
        path
    }

    fn record_for(path: &Path) -> FileRecord {
        let meta = std::fs::metadata(path).unwrap();
        FileRecord::new(path.to_path_buf(), meta.len(), None)
    }

    fn engine(mode: Mode, boost: Boost) -> Deduplicator {
        Deduplicator::new(DedupOptions::default().with_mode(mode).with_boost(boost)).unwrap()
    }

    struct CollectingSink(Mutex<Vec<ProgressEvent>>);

    impl ProgressSink for CollectingSink {
        fn emit(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn test_identical_small_files_grouped() {
        let dir = TempDir::new().unwrap();
        let a = write_file(dir.path(), "a.txt", b"hello");
        let b = write_file(dir.path(), "b.txt", b"hello");
        let c = write_file(dir.path(), "c.txt", b"world");

        let files = vec![record_for(&a), record_for(&b), record_for(&c)];
        let result = engine(Mode::Normal, Boost::Size).run(
            files,
            &AtomicBool::new(false),
            &NullSink,
        );

        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].size, 5);
        assert_eq!(result.groups[0].len(), 2);
        assert!(!result.partial);
    }

    #[test]
    fn test_small_files_get_exactly_one_range_hash() {
        let dir = TempDir::new().unwrap();
        let a = write_file(dir.path(), "a.txt", b"same");
        let b = write_file(dir.path(), "b.txt", b"same");

        let result = engine(Mode::Normal, Boost::Size).run(
            vec![record_for(&a), record_for(&b)],
            &AtomicBool::new(false),
            &NullSink,
        );

        for member in &result.groups[0].members {
            assert!(member.prints.front.is_some());
            assert!(member.prints.middle.is_none());
            assert!(member.prints.end.is_none());
            assert!(member.prints.full.is_none());
        }
    }

    #[test]
    fn test_same_size_different_content_not_grouped() {
        let dir = TempDir::new().unwrap();
        let a = write_file(dir.path(), "a.txt", b"aaaa");
        let b = write_file(dir.path(), "b.txt", b"bbbb");

        let result = engine(Mode::Normal, Boost::Size).run(
            vec![record_for(&a), record_for(&b)],
            &AtomicBool::new(false),
            &NullSink,
        );
        assert!(result.groups.is_empty());
    }

    #[test]
    fn test_boost_size_ext_splits_by_extension() {
        let dir = TempDir::new().unwrap();
        let a = write_file(dir.path(), "a.txt", b"data");
        let b = write_file(dir.path(), "b.jpg", b"data");

        let result = engine(Mode::Normal, Boost::SizeExt).run(
            vec![record_for(&a), record_for(&b)],
            &AtomicBool::new(false),
            &NullSink,
        );
        assert!(result.groups.is_empty());

        let a = record_for(&dir.path().join("a.txt"));
        let b = record_for(&dir.path().join("b.jpg"));
        let result =
            engine(Mode::Normal, Boost::Size).run(vec![a, b], &AtomicBool::new(false), &NullSink);
        assert_eq!(result.groups.len(), 1);
    }

    #[test]
    fn test_fuzzy_boost_groups_renamed_copies() {
        let dir = TempDir::new().unwrap();
        let a = write_file(dir.path(), "photo.jpg", b"image-bytes");
        let b = write_file(dir.path(), "photo (1).jpg", b"image-bytes");

        let result = engine(Mode::Normal, Boost::SizeFuzzyFilename).run(
            vec![record_for(&a), record_for(&b)],
            &AtomicBool::new(false),
            &NullSink,
        );
        assert_eq!(result.groups.len(), 1);
    }

    #[test]
    fn test_unreadable_file_is_demoted() {
        let dir = TempDir::new().unwrap();
        let a = write_file(dir.path(), "a.bin", b"content!");
        let b = write_file(dir.path(), "b.bin", b"content!");
        let records = vec![record_for(&a), record_for(&b)];
        std::fs::remove_file(&b).unwrap();

        let sink = CollectingSink(Mutex::new(Vec::new()));
        let result =
            engine(Mode::Normal, Boost::Size).run(records, &AtomicBool::new(false), &sink);

        // The survivor is a singleton; the failure surfaced as a warning.
        assert!(result.groups.is_empty());
        let events = sink.0.lock().unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, ProgressEvent::Warning { path, .. } if *path == b)));
    }

    /// Sink that raises the stop flag when the named stage reports its
    /// final completion, cancelling the run between two hashing rounds.
    struct StopAfterStage<'a> {
        stage: &'static str,
        stop: &'a AtomicBool,
    }

    impl ProgressSink for StopAfterStage<'_> {
        fn emit(&self, event: ProgressEvent) {
            if let ProgressEvent::StageProgress { stage, done, total } = event {
                if stage == self.stage && done == total {
                    self.stop.store(true, Ordering::SeqCst);
                }
            }
        }
    }

    #[test]
    fn test_cancel_after_front_keeps_the_front_survivors() {
        let dir = TempDir::new().unwrap();
        // Large enough that the middle and end rounds both apply.
        let content = vec![9u8; 3 * CHUNK as usize];
        let a = write_file(dir.path(), "a.bin", &content);
        let b = write_file(dir.path(), "b.bin", &content);

        let stop = AtomicBool::new(false);
        let sink = StopAfterStage {
            stage: "front",
            stop: &stop,
        };
        let result = engine(Mode::Normal, Boost::Size).run(
            vec![record_for(&a), record_for(&b)],
            &stop,
            &sink,
        );

        // The front round finished for every survivor, so its grouping is
        // kept; the middle and end rounds never ran.
        assert!(result.partial);
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].len(), 2);
        for member in &result.groups[0].members {
            assert!(member.prints.front.is_some());
            assert!(member.prints.middle.is_none());
            assert!(member.prints.end.is_none());
        }
    }

    #[test]
    fn test_cancel_before_the_end_round_keeps_middle_survivors() {
        let dir = TempDir::new().unwrap();
        let content = vec![4u8; 3 * CHUNK as usize];
        let a = write_file(dir.path(), "a.bin", &content);
        let b = write_file(dir.path(), "b.bin", &content);

        let stop = AtomicBool::new(false);
        let sink = StopAfterStage {
            stage: "middle",
            stop: &stop,
        };
        let result = engine(Mode::Normal, Boost::Size).run(
            vec![record_for(&a), record_for(&b)],
            &stop,
            &sink,
        );

        assert!(result.partial);
        assert_eq!(result.groups.len(), 1);
        for member in &result.groups[0].members {
            assert!(member.prints.front.is_some());
            assert!(member.prints.middle.is_some());
            assert!(member.prints.end.is_none());
        }
    }

    #[test]
    fn test_pre_set_stop_yields_partial_empty_result() {
        let dir = TempDir::new().unwrap();
        let a = write_file(dir.path(), "a.txt", b"same");
        let b = write_file(dir.path(), "b.txt", b"same");

        let stop = AtomicBool::new(true);
        let result = engine(Mode::Normal, Boost::Size).run(
            vec![record_for(&a), record_for(&b)],
            &stop,
            &NullSink,
        );
        assert!(result.partial);
        assert!(result.groups.is_empty());
    }

    #[test]
    fn test_done_event_carries_summary() {
        let dir = TempDir::new().unwrap();
        let a = write_file(dir.path(), "a.txt", b"12345");
        let b = write_file(dir.path(), "b.txt", b"12345");

        let sink = CollectingSink(Mutex::new(Vec::new()));
        engine(Mode::Fast, Boost::Size).run(
            vec![record_for(&a), record_for(&b)],
            &AtomicBool::new(false),
            &sink,
        );

        let events = sink.0.lock().unwrap();
        let summary = events.iter().find_map(|e| match e {
            ProgressEvent::Done { summary } => Some(summary.clone()),
            _ => None,
        });
        let summary = summary.expect("missing Done event");
        assert_eq!(summary.files_scanned, 2);
        assert_eq!(summary.groups, 1);
        assert_eq!(summary.duplicate_files, 2);
        assert_eq!(summary.recoverable_bytes, 5);
    }

    #[test]
    fn test_result_tagged_with_mode() {
        let dir = TempDir::new().unwrap();
        let a = write_file(dir.path(), "a.txt", b"x1");
        let b = write_file(dir.path(), "b.txt", b"x1");

        let result = engine(Mode::Fast, Boost::Size).run(
            vec![record_for(&a), record_for(&b)],
            &AtomicBool::new(false),
            &NullSink,
        );
        assert_eq!(result.mode, Mode::Fast);
        assert_eq!(result.groups[0].stage, Mode::Fast);
    }

    #[test]
    fn test_default_workers_capped_at_eight() {
        assert!(default_workers() >= 1);
        assert!(default_workers() <= 8);
    }
}
