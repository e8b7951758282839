//! Bucketing primitive shared by every pipeline stage.
//!
//! Groups records by a key function and drops singleton buckets: a file
//! alone under its key cannot be a duplicate and leaves the pipeline. The
//! key must be pure and cheap (or already cached on the record) - every
//! stage calls this once per surviving group.

use std::collections::HashMap;
use std::hash::Hash;

use crate::scanner::FileRecord;

/// Bucket `records` by `key`, discarding buckets with fewer than two
/// entries. Bucket order is unspecified; the caller sorts. Order within a
/// bucket follows input order.
#[must_use]
pub fn group_by<K, F>(records: Vec<FileRecord>, key: F) -> Vec<Vec<FileRecord>>
where
    K: Eq + Hash,
    F: Fn(&FileRecord) -> K,
{
    let mut buckets: HashMap<K, Vec<FileRecord>> = HashMap::new();
    for record in records {
        buckets.entry(key(&record)).or_default().push(record);
    }
    buckets
        .into_values()
        .filter(|bucket| bucket.len() >= 2)
        .collect()
}
