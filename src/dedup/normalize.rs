//! Fuzzy filename normalization for the size+fuzzy-filename boost key.
//!
//! Renamed copies of a file usually differ from the original only by a
//! counter or a copy marker: `photo (1).jpg`, `photo - Copy.jpg`,
//! `photo_2.jpg`. Normalization collapses those variants onto one key so the
//! boost stage groups them before any hashing happens. The rules are frozen
//! by the tests below; changing them changes which files get grouped and is
//! a behavioral break.
//!
//! Order of operations on the stem (extension preserved):
//! 1. lowercase
//! 2. drop parenthesized segments: `report (1)` → `report`
//! 3. drop copy-marker tails (`copy`, `new`, `final`, `old`, `backup`, with
//!    an optional trailing counter): `photo - Copy2` → `photo`
//! 4. drop a trailing separator plus 1–3 digits: `img_12` → `img` (four or
//!    more digits look like years or camera counters and are kept)
//! 5. drop separator noise: `_`, `-`, `.`, spaces

use regex::Regex;
use std::sync::OnceLock;

fn brackets() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\([^)]*\)\s*").unwrap())
}

fn copy_markers() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)[_\-\s]?(copy|new|final|old|backup)[_\-\s]?\d*\s*$").unwrap()
    })
}

fn trailing_counter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[_\-]\d{1,3}\s*$").unwrap())
}

fn noise() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[_\s.\-]").unwrap())
}

/// Normalize a filename for fuzzy grouping.
///
/// Pure; the same input always maps to the same key.
#[must_use]
pub fn normalize_filename(filename: &str) -> String {
    if filename.is_empty() {
        return String::new();
    }

    let lower = filename.to_lowercase();
    let (stem, ext) = match lower.rfind('.') {
        // A leading dot is a hidden-file prefix, not an extension separator.
        Some(idx) if idx > 0 => (&lower[..idx], &lower[idx..]),
        _ => (lower.as_str(), ""),
    };

    let stem = brackets().replace_all(stem, "");
    let stem = copy_markers().replace(&stem, "");
    let stem = trailing_counter().replace(&stem, "");
    let stem = noise().replace_all(&stem, "");

    format!("{stem}{ext}")
}
