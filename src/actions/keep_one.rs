//! Keep-one executor: retain the first-ranked member of every group, move
//! the rest to trash.
//!
//! The executor ranks each group itself, so the winner is deterministic
//! regardless of how the caller ordered members. Failures never abort the
//! run: a file whose move fails stays in place and is reported. Before
//! every move the file's current size is re-checked against the scanned
//! size, catching files that changed between scan and deletion (and
//! fingerprints loaded from disk, which are display-only). Cancellation is
//! honored between files, never inside a move.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::dedup::{sort_groups, DedupResult, DuplicateGroup};
use crate::ranker::{rank_group, SortKey};

/// Outcome of a keep-one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeepOneReport {
    /// Files successfully moved to trash.
    pub moved: usize,
    /// Per-file failures with reasons; these files were not moved.
    pub failures: Vec<(PathBuf, String)>,
    /// Bytes freed by the successful moves.
    pub bytes_freed: u64,
    /// True if the stop flag cut the run short.
    pub cancelled: bool,
}

impl KeepOneReport {
    /// Number of failed moves.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// True when every attempted move succeeded and the run completed.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

/// Execute keep-one over a result.
///
/// Returns the rebuilt result (surviving members only, groups reduced to a
/// single member dropped, ordering re-established) and the report.
pub fn keep_one(
    result: DedupResult,
    sort: SortKey,
    move_to_trash: &dyn Fn(&Path) -> Result<(), String>,
    stop: &AtomicBool,
) -> (DedupResult, KeepOneReport) {
    let mut report = KeepOneReport::default();
    let mut surviving_groups = Vec::new();

    for mut group in result.groups {
        rank_group(&mut group, sort);

        let mut members = group.members.into_iter();
        let mut survivors: Vec<_> = members.next().into_iter().collect();

        for victim in members {
            if report.cancelled || stop.load(Ordering::SeqCst) {
                // Nothing moved for this file; it stays in the group.
                report.cancelled = true;
                survivors.push(victim);
                continue;
            }

            match verify_size(&victim.path, victim.size) {
                Ok(()) => {}
                Err(VerifyError::Changed { found }) => {
                    report.failures.push((
                        victim.path.clone(),
                        format!("size changed since scan ({} -> {found} bytes)", victim.size),
                    ));
                    survivors.push(victim);
                    continue;
                }
                Err(VerifyError::Stat(message)) => {
                    // The file is gone or unreadable; nothing to keep.
                    report.failures.push((victim.path.clone(), message));
                    continue;
                }
            }

            match move_to_trash(&victim.path) {
                Ok(()) => {
                    log::info!("moved to trash: {}", victim.path.display());
                    report.moved += 1;
                    report.bytes_freed += victim.size;
                }
                Err(reason) => {
                    log::warn!("trash move failed for {}: {reason}", victim.path.display());
                    report.failures.push((victim.path.clone(), reason));
                    survivors.push(victim);
                }
            }
        }

        if survivors.len() >= 2 {
            surviving_groups.push(DuplicateGroup {
                size: group.size,
                members: survivors,
                stage: group.stage,
            });
        }
    }

    sort_groups(&mut surviving_groups);

    let rebuilt = DedupResult {
        groups: surviving_groups,
        mode: result.mode,
        boost: result.boost,
        partial: result.partial,
    };
    (rebuilt, report)
}

enum VerifyError {
    Changed { found: u64 },
    Stat(String),
}

fn verify_size(path: &Path, expected: u64) -> Result<(), VerifyError> {
    let metadata =
        fs::metadata(path).map_err(|e| VerifyError::Stat(format!("cannot stat: {e}")))?;
    if metadata.len() != expected {
        return Err(VerifyError::Changed {
            found: metadata.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::{Boost, Mode};
    use crate::scanner::FileRecord;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        File::create(&path).unwrap().write_all(content).unwrap();
        path
    }

    fn record_for(path: &Path, priority: bool) -> FileRecord {
        let meta = fs::metadata(path).unwrap();
        let mut r = FileRecord::new(path.to_path_buf(), meta.len(), None);
        r.priority = priority;
        r
    }

    fn result_of(groups: Vec<DuplicateGroup>) -> DedupResult {
        DedupResult {
            groups,
            mode: Mode::Normal,
            boost: Boost::Size,
            partial: false,
        }
    }

    /// Trash stand-in that records the path and removes the file, so
    /// survivor checks observe a realistic filesystem.
    fn removing_trash(log: &Mutex<Vec<PathBuf>>) -> impl Fn(&Path) -> Result<(), String> + '_ {
        move |path| {
            fs::remove_file(path).map_err(|e| e.to_string())?;
            log.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    #[test]
    fn test_keeps_first_ranked_and_trashes_rest() {
        let dir = TempDir::new().unwrap();
        let keep = write_file(dir.path(), "a.txt", b"same-bytes");
        let lose1 = write_file(dir.path(), "bb.txt", b"same-bytes");
        let lose2 = write_file(dir.path(), "ccc.txt", b"same-bytes");

        let group = DuplicateGroup {
            size: 10,
            members: vec![
                record_for(&lose2, false),
                record_for(&keep, false),
                record_for(&lose1, false),
            ],
            stage: Mode::Normal,
        };

        let trashed = Mutex::new(Vec::new());
        let (rebuilt, report) = keep_one(
            result_of(vec![group]),
            SortKey::ShortestFilename,
            &removing_trash(&trashed),
            &AtomicBool::new(false),
        );

        assert_eq!(report.moved, 2);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.bytes_freed, 20);
        assert!(keep.exists());
        assert!(!lose1.exists());
        assert!(!lose2.exists());
        // The group shrank to one member and is dropped from display.
        assert!(rebuilt.groups.is_empty());
    }

    #[test]
    fn test_priority_member_survives() {
        let dir = TempDir::new().unwrap();
        let prio_dir = dir.path().join("prio");
        fs::create_dir(&prio_dir).unwrap();
        let keep = write_file(&prio_dir, "deep_name.txt", b"data");
        let lose = write_file(dir.path(), "a.txt", b"data");

        let group = DuplicateGroup {
            size: 4,
            members: vec![record_for(&lose, false), record_for(&keep, true)],
            stage: Mode::Normal,
        };

        let trashed = Mutex::new(Vec::new());
        let (_, report) = keep_one(
            result_of(vec![group]),
            SortKey::ShortestPath,
            &removing_trash(&trashed),
            &AtomicBool::new(false),
        );

        assert_eq!(report.moved, 1);
        assert!(keep.exists());
        assert!(!lose.exists());
    }

    #[test]
    fn test_failed_move_keeps_file_and_continues() {
        let dir = TempDir::new().unwrap();
        let keep = write_file(dir.path(), "a.txt", b"12345678");
        let stubborn = write_file(dir.path(), "bb.txt", b"12345678");
        let movable = write_file(dir.path(), "ccc.txt", b"12345678");

        let group = DuplicateGroup {
            size: 8,
            members: vec![
                record_for(&keep, false),
                record_for(&stubborn, false),
                record_for(&movable, false),
            ],
            stage: Mode::Normal,
        };

        let op = |path: &Path| -> Result<(), String> {
            if path.ends_with("bb.txt") {
                Err("permission denied".to_string())
            } else {
                fs::remove_file(path).map_err(|e| e.to_string())
            }
        };

        let (rebuilt, report) = keep_one(
            result_of(vec![group]),
            SortKey::ShortestFilename,
            &op,
            &AtomicBool::new(false),
        );

        assert_eq!(report.moved, 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].0, stubborn);
        assert!(stubborn.exists());
        assert!(!movable.exists());
        // Keeper plus the stubborn file still form a visible group.
        assert_eq!(rebuilt.groups.len(), 1);
        assert_eq!(rebuilt.groups[0].len(), 2);
    }

    #[test]
    fn test_size_mismatch_blocks_the_move() {
        let dir = TempDir::new().unwrap();
        let keep = write_file(dir.path(), "a.txt", b"1234");
        let changed = write_file(dir.path(), "bb.txt", b"1234");

        let mut victim = record_for(&changed, false);
        victim.size = 4;
        let group = DuplicateGroup {
            size: 4,
            members: vec![record_for(&keep, false), victim],
            stage: Mode::Normal,
        };

        // Mutate after the "scan".
        fs::write(&changed, b"123456789").unwrap();

        let trashed = Mutex::new(Vec::new());
        let (_, report) = keep_one(
            result_of(vec![group]),
            SortKey::ShortestFilename,
            &removing_trash(&trashed),
            &AtomicBool::new(false),
        );

        assert_eq!(report.moved, 0);
        assert_eq!(report.failed(), 1);
        assert!(report.failures[0].1.contains("size changed"));
        assert!(changed.exists());
    }

    #[test]
    fn test_cancellation_between_files() {
        let dir = TempDir::new().unwrap();
        let keep = write_file(dir.path(), "a.txt", b"xyzw");
        let b = write_file(dir.path(), "bb.txt", b"xyzw");
        let c = write_file(dir.path(), "ccc.txt", b"xyzw");

        let group = DuplicateGroup {
            size: 4,
            members: vec![
                record_for(&keep, false),
                record_for(&b, false),
                record_for(&c, false),
            ],
            stage: Mode::Normal,
        };

        let stop = AtomicBool::new(false);
        let op = |path: &Path| -> Result<(), String> {
            // Request cancellation after the first move completes.
            stop.store(true, Ordering::SeqCst);
            fs::remove_file(path).map_err(|e| e.to_string())
        };

        let (rebuilt, report) = keep_one(
            result_of(vec![group]),
            SortKey::ShortestFilename,
            &op,
            &stop,
        );

        assert!(report.cancelled);
        assert_eq!(report.moved, 1);
        assert!(c.exists());
        // Keeper and the untouched file remain a group.
        assert_eq!(rebuilt.groups.len(), 1);
    }

    #[test]
    fn test_empty_result_is_a_no_op() {
        let (rebuilt, report) = keep_one(
            result_of(Vec::new()),
            SortKey::ShortestPath,
            &|_| Ok(()),
            &AtomicBool::new(false),
        );
        assert!(rebuilt.groups.is_empty());
        assert_eq!(report, KeepOneReport::default());
    }
}
