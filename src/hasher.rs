//! Range hashing of file contents with xxHash64.
//!
//! Four readers are provided: `front`, `middle`, and `end` hash a bounded
//! window of the file, `full` streams the whole content. All four feed an
//! [`XxHash64`] seeded with 0, producing 64-bit digests. The algorithm and
//! digest width are part of the on-disk result format and must not change.
//!
//! For files with `size <= CHUNK` the three windows coincide, so callers
//! compute only `front` for them (the engine short-circuits accordingly).

use std::fs::File;
use std::hash::Hasher as _;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use twox_hash::XxHash64;

/// Window size for the partial hashes: 128 KiB. Pinned as the digest
/// contract for saved results; see DESIGN.md for the migration note.
pub const CHUNK: u64 = 128 * 1024;

/// Block size for streaming the full hash.
const STREAM_BLOCK: usize = 64 * 1024;

/// 64-bit content digest.
pub type Digest = u64;

/// Read failure while hashing. The engine demotes the affected file to a
/// singleton; the run continues.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("read failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl HashError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Hash the first `min(size, CHUNK)` bytes.
pub fn front(path: &Path, size: u64) -> Result<Digest, HashError> {
    hash_window(path, 0, size.min(CHUNK))
}

/// Hash `min(size, CHUNK)` bytes centered on the middle of the file.
///
/// The window starts at `max(0, size/2 - CHUNK/2)`.
pub fn middle(path: &Path, size: u64) -> Result<Digest, HashError> {
    let offset = (size / 2).saturating_sub(CHUNK / 2);
    hash_window(path, offset, size.min(CHUNK))
}

/// Hash the last `min(size, CHUNK)` bytes.
pub fn end(path: &Path, size: u64) -> Result<Digest, HashError> {
    let len = size.min(CHUNK);
    hash_window(path, size - len, len)
}

/// Hash the entire file, streamed in blocks.
pub fn full(path: &Path) -> Result<Digest, HashError> {
    let mut file = File::open(path).map_err(|e| HashError::io(path, e))?;
    let mut hasher = XxHash64::with_seed(0);
    let mut buf = vec![0u8; STREAM_BLOCK];
    loop {
        let n = file.read(&mut buf).map_err(|e| HashError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.write(&buf[..n]);
    }
    Ok(hasher.finish())
}

/// Hash up to `len` bytes starting at `offset`. Reads stop early at EOF, so
/// a file that shrank since the scan still produces a digest rather than an
/// error; the size re-check before deletion catches the mutation.
fn hash_window(path: &Path, offset: u64, len: u64) -> Result<Digest, HashError> {
    let mut file = File::open(path).map_err(|e| HashError::io(path, e))?;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| HashError::io(path, e))?;
    }
    let mut hasher = XxHash64::with_seed(0);
    let mut remaining = len as usize;
    let mut buf = vec![0u8; STREAM_BLOCK.min(len as usize).max(1)];
    while remaining > 0 {
        let want = remaining.min(buf.len());
        let n = file
            .read(&mut buf[..want])
            .map_err(|e| HashError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.write(&buf[..n]);
        remaining -= n;
    }
    Ok(hasher.finish())
}

/// Format a digest as a lowercase 16-hex-digit string.
#[must_use]
pub fn digest_to_hex(digest: Digest) -> String {
    format!("{digest:016x}")
}

/// Parse a lowercase 16-hex-digit string back into a digest.
#[must_use]
pub fn digest_from_hex(hex: &str) -> Option<Digest> {
    if hex.len() != 16 {
        return None;
    }
    Digest::from_str_radix(hex, 16).ok()
}
