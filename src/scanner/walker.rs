//! Recursive directory walker.
//!
//! Single-threaded traversal of one root. Entries in each directory are
//! sorted by name, so emission order is deterministic for a given
//! filesystem state. Unreadable directories are counted and skipped.
//! Symbolic links to files are followed, each target inode entering the
//! scan at most once; symbolic links to directories are never followed,
//! which together with the inode set rules out traversal cycles.
//!
//! The stop flag is polled at every directory boundary; a cancelled scan
//! returns the records gathered so far.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use crate::config::FilterConfig;
use crate::progress::{ProgressEvent, ProgressSink, SCAN_PROGRESS_INTERVAL};

use super::{FileRecord, InodeTracker, ScanError, ScanResult};

/// Directory walker for file discovery.
#[derive(Debug)]
pub struct Walker {
    root: PathBuf,
    filters: FilterConfig,
}

struct WalkState<'a> {
    files: Vec<FileRecord>,
    tracker: InodeTracker,
    files_seen: u64,
    total_bytes: u64,
    skipped_dirs: usize,
    stop: &'a AtomicBool,
    sink: &'a dyn ProgressSink,
}

impl<'a> WalkState<'a> {
    fn warn(&self, path: &Path, message: String) {
        log::warn!("{}: {}", path.display(), message);
        self.sink.emit(ProgressEvent::Warning {
            path: path.to_path_buf(),
            message,
        });
    }

    fn saw_file(&mut self) {
        self.files_seen += 1;
        if self.files_seen % SCAN_PROGRESS_INTERVAL == 0 {
            self.sink.emit(ProgressEvent::ScanProgress {
                files_seen: self.files_seen,
            });
        }
    }
}

impl Walker {
    /// Create a walker for the given root.
    #[must_use]
    pub fn new(root: &Path, filters: FilterConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            filters,
        }
    }

    /// Walk the tree and collect every file passing the filters.
    ///
    /// # Errors
    ///
    /// Fails only for problems with the root itself (missing, not a
    /// directory, unresolvable). Everything below the root degrades to
    /// warnings on the progress sink.
    pub fn scan(
        &self,
        stop: &AtomicBool,
        sink: &dyn ProgressSink,
    ) -> Result<ScanResult, ScanError> {
        let root = fs::canonicalize(&self.root).map_err(|e| ScanError::from_io(&self.root, e))?;
        let meta = fs::metadata(&root).map_err(|e| ScanError::from_io(&root, e))?;
        if !meta.is_dir() {
            return Err(ScanError::NotADirectory(root));
        }

        let mut state = WalkState {
            files: Vec::new(),
            tracker: InodeTracker::new(),
            files_seen: 0,
            total_bytes: 0,
            skipped_dirs: 0,
            stop,
            sink,
        };

        // An excluded root yields an empty scan, not an error.
        if self.filters.is_excluded(&root) {
            log::debug!("scan root {} is excluded", root.display());
        } else {
            self.walk_dir(&root, &mut state);
        }

        if state.files_seen % SCAN_PROGRESS_INTERVAL != 0 {
            sink.emit(ProgressEvent::ScanProgress {
                files_seen: state.files_seen,
            });
        }

        log::debug!(
            "scan finished: {} records, {} skipped dirs",
            state.files.len(),
            state.skipped_dirs
        );

        Ok(ScanResult {
            files: state.files,
            filters: self.filters.clone(),
            total_bytes: state.total_bytes,
            skipped_dirs: state.skipped_dirs,
        })
    }

    fn walk_dir(&self, dir: &Path, state: &mut WalkState<'_>) {
        if state.stop.load(Ordering::SeqCst) {
            return;
        }

        let reader = match fs::read_dir(dir) {
            Ok(reader) => reader,
            Err(e) => {
                state.skipped_dirs += 1;
                state.warn(dir, format!("cannot read directory: {e}"));
                return;
            }
        };

        let mut entries: Vec<_> = reader.filter_map(Result::ok).collect();
        entries.sort_by_key(std::fs::DirEntry::file_name);

        for entry in entries {
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(e) => {
                    state.warn(&path, format!("stat failed: {e}"));
                    continue;
                }
            };

            if file_type.is_dir() {
                if self.filters.is_excluded(&path) {
                    log::debug!("skipping excluded directory: {}", path.display());
                } else {
                    self.walk_dir(&path, state);
                }
                continue;
            }

            if file_type.is_symlink() {
                self.process_symlink(&path, state);
            } else if file_type.is_file() {
                self.process_file(&path, state);
            }
            // Sockets, fifos and the like are ignored.
        }
    }

    fn process_file(&self, path: &Path, state: &mut WalkState<'_>) {
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                state.warn(path, format!("stat failed: {e}"));
                return;
            }
        };
        state.saw_file();
        if !state.tracker.first_visit(&metadata) {
            log::debug!("skipping hardlink: {}", path.display());
            return;
        }
        // The directory chain is canonical (the root was canonicalized and
        // directory links are not followed), so the entry path already is.
        self.accept(path.to_path_buf(), &metadata, state);
    }

    fn process_symlink(&self, path: &Path, state: &mut WalkState<'_>) {
        // fs::metadata follows the link.
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                state.warn(path, format!("broken link: {e}"));
                return;
            }
        };
        if !metadata.is_file() {
            // Directory links are never followed.
            log::debug!("skipping directory symlink: {}", path.display());
            return;
        }
        state.saw_file();
        if !state.tracker.first_visit(&metadata) {
            log::debug!("skipping already-visited link target: {}", path.display());
            return;
        }
        let target = match fs::canonicalize(path) {
            Ok(t) => t,
            Err(e) => {
                state.warn(path, format!("cannot resolve link: {e}"));
                return;
            }
        };
        self.accept(target, &metadata, state);
    }

    fn accept(&self, path: PathBuf, metadata: &fs::Metadata, state: &mut WalkState<'_>) {
        let size = metadata.len();
        if !self.filters.accepts(&path, size) {
            return;
        }
        let mut record = FileRecord::new(path, size, epoch_seconds(metadata.modified().ok()));
        record.priority = self.filters.is_priority(&record.path);
        state.total_bytes += size;
        state.files.push(record);
    }
}

fn epoch_seconds(time: Option<SystemTime>) -> Option<i64> {
    let time = time?;
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => Some(d.as_secs() as i64),
        Err(e) => Some(-(e.duration().as_secs() as i64)),
    }
}
