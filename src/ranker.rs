//! Within-group ordering for keep-one decisions.
//!
//! The first member after ranking is the one keep-one preserves, so the
//! comparator must be a total order: with unique paths as the final
//! tiebreak, the winner is deterministic and invariant under input
//! permutation.

use serde::{Deserialize, Serialize};

use crate::dedup::{DedupResult, DuplicateGroup};
use crate::scanner::FileRecord;

/// Secondary sort applied within each priority class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    /// Fewer path components first, then shorter basename, then path.
    #[default]
    ShortestPath,
    /// Shorter basename first, then fewer path components, then path.
    ShortestFilename,
}

impl SortKey {
    /// Stable name as used on the CLI.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::ShortestPath => "shortest-path",
            SortKey::ShortestFilename => "shortest-filename",
        }
    }
}

/// Order a group's members: priority files first, then by the sort key.
pub fn rank_group(group: &mut DuplicateGroup, key: SortKey) {
    group.members.sort_by(|a, b| compare(a, b, key));
}

/// Rank every group of a result.
pub fn rank_all(result: &mut DedupResult, key: SortKey) {
    for group in &mut result.groups {
        rank_group(group, key);
    }
}

fn compare(a: &FileRecord, b: &FileRecord, key: SortKey) -> std::cmp::Ordering {
    // Priority class first: priority files sort before non-priority.
    let class = a.priority.cmp(&b.priority).reverse();
    let ordering = match key {
        SortKey::ShortestPath => class
            .then_with(|| a.depth.cmp(&b.depth))
            .then_with(|| a.basename().len().cmp(&b.basename().len())),
        SortKey::ShortestFilename => class
            .then_with(|| a.basename().len().cmp(&b.basename().len()))
            .then_with(|| a.depth.cmp(&b.depth)),
    };
    ordering.then_with(|| a.path.cmp(&b.path))
}
