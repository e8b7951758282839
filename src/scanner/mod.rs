//! File discovery: records, scan results, and the directory walker.
//!
//! The scanner produces [`FileRecord`] values for every regular file under
//! the root that passes the [`FilterConfig`](crate::config::FilterConfig)
//! predicate. Records are immutable after the scan except for their
//! fingerprint slots, which the deduplication stages fill monotonically.

pub mod inode;
pub mod walker;

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

use crate::config::FilterConfig;
use crate::hasher::Digest;

pub use inode::InodeTracker;
pub use walker::Walker;

/// Content fingerprints accumulated per file across pipeline stages.
///
/// Each slot is computed at most once per run and never overwritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fingerprints {
    /// Hash of the first window of the file.
    pub front: Option<Digest>,
    /// Hash of a window centered on the middle of the file.
    pub middle: Option<Digest>,
    /// Hash of the last window of the file.
    pub end: Option<Digest>,
    /// Hash of the full content.
    pub full: Option<Digest>,
}

/// A discovered file.
///
/// The path is canonicalized at discovery: absolute, with symlinks resolved
/// once. Paths within one scan are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Canonical absolute path.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Modification time as epoch seconds, when the filesystem reports one.
    pub mtime: Option<i64>,
    /// True if the path lies under a priority directory.
    pub priority: bool,
    /// Number of path components, used by the ranker.
    pub depth: usize,
    /// Accumulated content fingerprints.
    pub prints: Fingerprints,
}

impl FileRecord {
    /// Create a record for a path; depth is derived from the path.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, mtime: Option<i64>) -> Self {
        let depth = path.components().count();
        Self {
            path,
            size,
            mtime,
            priority: false,
            depth,
            prints: Fingerprints::default(),
        }
    }

    /// Final path component as UTF-8, lossy.
    #[must_use]
    pub fn basename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Lowercased extension, if any.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        crate::config::extension_of(&self.path)
    }
}

/// Everything the scanner produced for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Records in deterministic emission order.
    pub files: Vec<FileRecord>,
    /// The filters that were applied.
    pub filters: FilterConfig,
    /// Sum of all record sizes.
    pub total_bytes: u64,
    /// Directories skipped because they could not be read.
    pub skipped_dirs: usize,
}

/// Fatal problems with the scan root. Everything below the root is a
/// warning, not an error.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    pub(crate) fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// Stored scan parameters, kept alongside results for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanParams {
    /// Canonical scan root.
    pub root: PathBuf,
    /// Filters applied during the scan.
    #[serde(flatten)]
    pub filters: FilterConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_record_derives_depth() {
        let rec = FileRecord::new(PathBuf::from("/a/b/c.txt"), 10, None);
        // RootDir + three named components.
        assert_eq!(rec.depth, 4);
        assert_eq!(rec.basename(), "c.txt");
        assert_eq!(rec.extension(), Some("txt".to_string()));
    }

    #[test]
    fn test_fingerprints_start_empty() {
        let rec = FileRecord::new(PathBuf::from("/x"), 1, Some(0));
        assert_eq!(rec.prints, Fingerprints::default());
        assert!(rec.prints.front.is_none());
    }

    #[test]
    fn test_scan_error_display() {
        let err = ScanError::NotFound(PathBuf::from("/missing"));
        assert_eq!(err.to_string(), "path not found: /missing");
        let err = ScanError::NotADirectory(PathBuf::from("/file.txt"));
        assert_eq!(err.to_string(), "not a directory: /file.txt");
    }
}
