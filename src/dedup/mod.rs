//! Duplicate detection: modes, boost keys, groups, and the staged engine.
//!
//! Detection runs as a pipeline of stages, each one a round of
//! hash-the-survivors, regroup, drop-singletons:
//!
//! 1. **Boost**: group by a metadata key (size, optionally refined by
//!    extension or filename). No I/O beyond the scan's `stat`.
//! 2. **Front hash**: first window of the file. Runs in every mode.
//! 3. **Middle hash**: window at the file's center (`normal` and `full`).
//! 4. **End hash** (`normal`) or **full hash** (`full`).
//!
//! Identical files survive every stage; files that collide on a prefix are
//! separated as soon as a deeper window differs. `fast` mode stops after
//! the front hash and is a probabilistic filter: it can report false
//! positives for files that agree in their first window.

pub mod engine;
pub mod grouper;
pub mod normalize;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::scanner::FileRecord;

pub use engine::{Deduplicator, DedupOptions};
pub use grouper::group_by;
pub use normalize::normalize_filename;

/// How deep the hashing pipeline goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Size → front hash. Fastest; may report false positives.
    Fast,
    /// Size → front → middle → end hash.
    #[default]
    Normal,
    /// Size → front → middle → full content hash.
    Full,
}

impl Mode {
    /// Stable lowercase name, used in output and the result file.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Fast => "fast",
            Mode::Normal => "normal",
            Mode::Full => "full",
        }
    }
}

/// The metadata key used by the boost stage, before any content I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boost {
    /// Size alone.
    #[default]
    Size,
    /// Size plus lowercased extension.
    SizeExt,
    /// Size plus lowercased basename.
    SizeFilename,
    /// Size plus fuzzy-normalized basename (see [`normalize_filename`]).
    SizeFuzzyFilename,
}

impl Boost {
    /// Stable name, used in the result file.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Boost::Size => "size",
            Boost::SizeExt => "size_ext",
            Boost::SizeFilename => "size_filename",
            Boost::SizeFuzzyFilename => "size_fuzzy_filename",
        }
    }
}

/// A set of two or more files proven identical up to the active mode's
/// depth.
///
/// Every member has the group's size, and every pair agrees on each digest
/// the mode computes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    /// Common member size in bytes.
    pub size: u64,
    /// Members; order is assigned by the ranker before display or deletion.
    pub members: Vec<FileRecord>,
    /// The mode whose final stage proved membership.
    pub stage: Mode,
}

impl DuplicateGroup {
    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if the group has no members (does not occur in valid results).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Bytes freed if all but one member were removed.
    #[must_use]
    pub fn recoverable_bytes(&self) -> u64 {
        self.size * (self.members.len() as u64).saturating_sub(1)
    }

    /// Lexicographically smallest member path, the final sort tiebreak.
    #[must_use]
    pub fn min_path(&self) -> &Path {
        self.members
            .iter()
            .map(|m| m.path.as_path())
            .min()
            .map_or(Path::new(""), |p| p)
    }
}

/// Output of one deduplication run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupResult {
    /// Groups, sorted by recoverable bytes descending, then member size
    /// descending, then smallest member path.
    pub groups: Vec<DuplicateGroup>,
    /// The mode the run used.
    pub mode: Mode,
    /// The boost key the run used.
    pub boost: Boost,
    /// True when cancellation truncated the pipeline; the groups then cover
    /// only the stages that fully finished.
    pub partial: bool,
}

impl DedupResult {
    /// Total members across all groups.
    #[must_use]
    pub fn duplicate_files(&self) -> usize {
        self.groups.iter().map(DuplicateGroup::len).sum()
    }

    /// Total recoverable bytes across all groups.
    #[must_use]
    pub fn recoverable_bytes(&self) -> u64 {
        self.groups.iter().map(DuplicateGroup::recoverable_bytes).sum()
    }
}

/// Apply the deterministic result ordering.
pub(crate) fn sort_groups(groups: &mut [DuplicateGroup]) {
    groups.sort_by(|a, b| {
        b.recoverable_bytes()
            .cmp(&a.recoverable_bytes())
            .then_with(|| b.size.cmp(&a.size))
            .then_with(|| a.min_path().cmp(b.min_path()))
    });
}
