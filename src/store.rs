//! Versioned JSON persistence of deduplication results.
//!
//! The file stores the scan parameters, the referenced files with any
//! fingerprints computed during the run (as lowercase 16-hex-digit
//! strings), and the groups as 0-based indices into the file list:
//!
//! ```json
//! {
//!   "schema": 1,
//!   "filters": { "root": "/scan/root", "min_size": 1, ... },
//!   "mode": "normal",
//!   "boost": "size",
//!   "files": [ { "path": "...", "size": 5, "mtime": 1700000000,
//!                "front": "0011223344556677", "middle": null,
//!                "end": null, "full": null } ],
//!   "groups": [ { "size": 5, "mode": "normal", "members": [0, 1] } ]
//! }
//! ```
//!
//! Loading validates the schema version and every reference, and rebuilds
//! the result without re-hashing. Fingerprints read from disk are trusted
//! for display only; any later keep-one re-verifies sizes via `stat`, and
//! a run with a different mode re-hashes from scratch.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::dedup::{Boost, DedupResult, DuplicateGroup, Mode};
use crate::hasher::{digest_from_hex, digest_to_hex, Digest};
use crate::scanner::{FileRecord, Fingerprints, ScanParams};

/// Current result file format version.
pub const SCHEMA_VERSION: u32 = 1;

/// Problems reading or writing a result file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported schema version {found} (this build reads {SCHEMA_VERSION})")]
    SchemaMismatch { found: u32 },

    #[error("corrupted result file: {0}")]
    Corrupted(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredFile {
    path: PathBuf,
    size: u64,
    mtime: Option<i64>,
    front: Option<String>,
    middle: Option<String>,
    end: Option<String>,
    full: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredGroup {
    size: u64,
    mode: Mode,
    members: Vec<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredDoc {
    schema: u32,
    filters: ScanParams,
    mode: Mode,
    boost: Boost,
    files: Vec<StoredFile>,
    groups: Vec<StoredGroup>,
}

/// Serialize a result to the JSON format. Output is byte-identical for
/// equal inputs, which makes repeated runs comparable.
pub fn to_json(result: &DedupResult, params: &ScanParams) -> Result<String, StoreError> {
    let mut files = Vec::new();
    let mut groups = Vec::new();

    for group in &result.groups {
        let base = files.len();
        for member in &group.members {
            files.push(StoredFile {
                path: member.path.clone(),
                size: member.size,
                mtime: member.mtime,
                front: member.prints.front.map(digest_to_hex),
                middle: member.prints.middle.map(digest_to_hex),
                end: member.prints.end.map(digest_to_hex),
                full: member.prints.full.map(digest_to_hex),
            });
        }
        groups.push(StoredGroup {
            size: group.size,
            mode: group.stage,
            members: (base..base + group.members.len()).collect(),
        });
    }

    let doc = StoredDoc {
        schema: SCHEMA_VERSION,
        filters: params.clone(),
        mode: result.mode,
        boost: result.boost,
        files,
        groups,
    };

    let mut json =
        serde_json::to_string_pretty(&doc).map_err(|e| StoreError::Corrupted(e.to_string()))?;
    json.push('\n');
    Ok(json)
}

/// Save a result to a file.
pub fn save(path: &Path, result: &DedupResult, params: &ScanParams) -> Result<(), StoreError> {
    let json = to_json(result, params)?;
    fs::write(path, json).map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    log::info!("results saved to {}", path.display());
    Ok(())
}

/// Parse a result from its JSON form.
pub fn from_json(json: &str) -> Result<(DedupResult, ScanParams), StoreError> {
    // The schema field is checked before full decoding so an old file
    // reports a version mismatch, not a parse error.
    let probe: serde_json::Value =
        serde_json::from_str(json).map_err(|e| StoreError::Corrupted(e.to_string()))?;
    match probe.get("schema").and_then(serde_json::Value::as_u64) {
        Some(v) if v == u64::from(SCHEMA_VERSION) => {}
        Some(v) => {
            return Err(StoreError::SchemaMismatch { found: v as u32 });
        }
        None => {
            return Err(StoreError::Corrupted("missing schema field".to_string()));
        }
    }

    let doc: StoredDoc =
        serde_json::from_str(json).map_err(|e| StoreError::Corrupted(e.to_string()))?;

    let records: Vec<FileRecord> = doc
        .files
        .iter()
        .map(|f| rebuild_record(f, &doc.filters))
        .collect::<Result<_, _>>()?;

    let mut groups = Vec::with_capacity(doc.groups.len());
    for stored in &doc.groups {
        if stored.members.len() < 2 {
            return Err(StoreError::Corrupted(format!(
                "group of {} member(s)",
                stored.members.len()
            )));
        }
        let mut members = Vec::with_capacity(stored.members.len());
        for &index in &stored.members {
            let record = records.get(index).ok_or_else(|| {
                StoreError::Corrupted(format!("member index {index} out of bounds"))
            })?;
            if record.size != stored.size {
                return Err(StoreError::Corrupted(format!(
                    "member {} has size {}, group says {}",
                    record.path.display(),
                    record.size,
                    stored.size
                )));
            }
            members.push(record.clone());
        }
        groups.push(DuplicateGroup {
            size: stored.size,
            members,
            stage: stored.mode,
        });
    }

    Ok((
        DedupResult {
            groups,
            mode: doc.mode,
            boost: doc.boost,
            partial: false,
        },
        doc.filters,
    ))
}

/// Load a result file.
pub fn load(path: &Path) -> Result<(DedupResult, ScanParams), StoreError> {
    let json = fs::read_to_string(path).map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    from_json(&json)
}

fn rebuild_record(stored: &StoredFile, params: &ScanParams) -> Result<FileRecord, StoreError> {
    let mut record = FileRecord::new(stored.path.clone(), stored.size, stored.mtime);
    record.priority = params.filters.is_priority(&record.path);
    record.prints = Fingerprints {
        front: parse_digest(&stored.front)?,
        middle: parse_digest(&stored.middle)?,
        end: parse_digest(&stored.end)?,
        full: parse_digest(&stored.full)?,
    };
    Ok(record)
}

fn parse_digest(hex: &Option<String>) -> Result<Option<Digest>, StoreError> {
    match hex {
        None => Ok(None),
        Some(s) => digest_from_hex(s)
            .map(Some)
            .ok_or_else(|| StoreError::Corrupted(format!("bad digest: {s:?}"))),
    }
}
