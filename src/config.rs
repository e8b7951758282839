//! Filter configuration applied during the scan.
//!
//! All knobs travel in an explicit [`FilterConfig`] value; there is no
//! global state, so several scans can run concurrently with different
//! settings. The predicate is total: every candidate file is either kept or
//! rejected, never an error.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// File filters and directory sets for a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Reject files strictly smaller than this (bytes). The default of 1
    /// drops zero-byte files, which are all trivially identical.
    pub min_size: u64,

    /// Reject files strictly larger than this (bytes). `None` = unbounded.
    pub max_size: Option<u64>,

    /// Allowed extensions, lowercased, without the leading dot. An empty set
    /// means "all files". A file's extension is its final dotted component;
    /// files without one match only when the set is empty.
    pub extensions: BTreeSet<String>,

    /// Absolute directories whose subtrees are skipped entirely.
    pub excluded_dirs: Vec<PathBuf>,

    /// Absolute directories whose files rank first within a duplicate group.
    /// Does not affect inclusion.
    pub priority_dirs: Vec<PathBuf>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: None,
            extensions: BTreeSet::new(),
            excluded_dirs: Vec::new(),
            priority_dirs: Vec::new(),
        }
    }
}

impl FilterConfig {
    /// Set the minimum file size.
    #[must_use]
    pub fn with_min_size(mut self, size: u64) -> Self {
        self.min_size = size;
        self
    }

    /// Set the maximum file size.
    #[must_use]
    pub fn with_max_size(mut self, size: Option<u64>) -> Self {
        self.max_size = size;
        self
    }

    /// Set the allowed extensions. Input values may carry a leading dot and
    /// any case; they are normalized here.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .filter_map(|e| {
                let e = e.as_ref().trim().trim_start_matches('.').to_lowercase();
                if e.is_empty() {
                    None
                } else {
                    Some(e)
                }
            })
            .collect();
        self
    }

    /// Set the excluded directories.
    #[must_use]
    pub fn with_excluded_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.excluded_dirs = dirs;
        self
    }

    /// Set the priority directories.
    #[must_use]
    pub fn with_priority_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.priority_dirs = dirs;
        self
    }

    /// True if a regular file with this path and size passes every filter.
    #[must_use]
    pub fn accepts(&self, path: &Path, size: u64) -> bool {
        if size < self.min_size {
            return false;
        }
        if let Some(max) = self.max_size {
            if size > max {
                return false;
            }
        }
        if !self.extensions.is_empty() {
            match extension_of(path) {
                Some(ext) => {
                    if !self.extensions.contains(&ext) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        if self.is_excluded(path) {
            return false;
        }
        true
    }

    /// True if the path has an excluded directory as an ancestor (or is one).
    #[must_use]
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.excluded_dirs.iter().any(|dir| path.starts_with(dir))
    }

    /// True if the path has a priority directory as an ancestor.
    #[must_use]
    pub fn is_priority(&self, path: &Path) -> bool {
        self.priority_dirs.iter().any(|dir| path.starts_with(dir))
    }
}

/// The final dotted component of a filename, lowercased. `None` for files
/// without an extension.
#[must_use]
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rejects_empty_files() {
        let filters = FilterConfig::default();
        assert!(!filters.accepts(Path::new("/a/empty.txt"), 0));
        assert!(filters.accepts(Path::new("/a/one.txt"), 1));
    }

    #[test]
    fn test_size_bounds_are_strict() {
        let filters = FilterConfig::default()
            .with_min_size(10)
            .with_max_size(Some(100));
        assert!(!filters.accepts(Path::new("/f"), 9));
        assert!(filters.accepts(Path::new("/f"), 10));
        assert!(filters.accepts(Path::new("/f"), 100));
        assert!(!filters.accepts(Path::new("/f"), 101));
    }

    #[test]
    fn test_extension_normalization() {
        let filters = FilterConfig::default().with_extensions([".JPG", "png", " .Gif "]);
        assert!(filters.extensions.contains("jpg"));
        assert!(filters.extensions.contains("png"));
        assert!(filters.extensions.contains("gif"));
        assert_eq!(filters.extensions.len(), 3);
    }

    #[test]
    fn test_extension_filter() {
        let filters = FilterConfig::default().with_extensions(["jpg"]);
        assert!(filters.accepts(Path::new("/pic.jpg"), 5));
        assert!(filters.accepts(Path::new("/pic.JPG"), 5));
        assert!(!filters.accepts(Path::new("/doc.pdf"), 5));
        // No extension matches only the empty set.
        assert!(!filters.accepts(Path::new("/README"), 5));
        assert!(FilterConfig::default().accepts(Path::new("/README"), 5));
    }

    #[test]
    fn test_extension_is_final_component() {
        assert_eq!(extension_of(Path::new("/a/b.tar.gz")), Some("gz".into()));
        assert_eq!(extension_of(Path::new("/a/B.JPG")), Some("jpg".into()));
        assert_eq!(extension_of(Path::new("/a/noext")), None);
    }

    #[test]
    fn test_excluded_ancestry() {
        let filters =
            FilterConfig::default().with_excluded_dirs(vec![PathBuf::from("/root/cache")]);
        assert!(filters.is_excluded(Path::new("/root/cache/a/b.txt")));
        assert!(filters.is_excluded(Path::new("/root/cache")));
        assert!(!filters.is_excluded(Path::new("/root/cachette/b.txt")));
        assert!(!filters.accepts(Path::new("/root/cache/b.txt"), 5));
    }

    #[test]
    fn test_priority_does_not_affect_inclusion() {
        let filters =
            FilterConfig::default().with_priority_dirs(vec![PathBuf::from("/root/keep")]);
        assert!(filters.is_priority(Path::new("/root/keep/a.txt")));
        assert!(!filters.is_priority(Path::new("/root/other/a.txt")));
        assert!(filters.accepts(Path::new("/root/other/a.txt"), 5));
    }
}
