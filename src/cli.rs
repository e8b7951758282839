//! Command-line interface, built on the clap derive API.
//!
//! ```bash
//! # List duplicates under a directory
//! keepone -i ~/Downloads
//!
//! # Restrict to large images, prefer files under the originals folder
//! keepone -i ~/Pictures -m 1MB -x jpg png -p ~/Pictures/originals
//!
//! # Keep one file per group and trash the rest, without a prompt
//! keepone -i ~/Downloads --keep-one --force
//! ```

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::dedup::{Boost, Mode};
use crate::ranker::SortKey;

/// Fast duplicate file finder with safe keep-one deletion.
///
/// Files are compared by size first, then by staged xxHash64 content
/// hashes, reading no more of each file than needed to prove it unique.
#[derive(Debug, Parser)]
#[command(name = "keepone", version, about, long_about = None)]
pub struct Cli {
    /// Root directory to scan for duplicates
    #[arg(
        short = 'i',
        long,
        value_name = "PATH",
        required_unless_present = "load_json"
    )]
    pub input: Option<PathBuf>,

    /// Minimum file size, e.g. 500KB or 1MB (suffixes are powers of 1024)
    #[arg(short = 'm', long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Maximum file size, e.g. 2GB
    #[arg(short = 'M', long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// File extensions to include, with or without the leading dot
    #[arg(short = 'x', long, value_name = "EXT", num_args = 1..)]
    pub extensions: Vec<String>,

    /// Directories whose files are kept first during --keep-one
    #[arg(short = 'p', long = "priority-dirs", value_name = "DIR", num_args = 1..)]
    pub priority_dirs: Vec<PathBuf>,

    /// Directories to skip entirely
    #[arg(long = "excluded-dirs", value_name = "DIR", num_args = 1..)]
    pub excluded_dirs: Vec<PathBuf>,

    /// Initial grouping key applied before any content hashing
    #[arg(long, value_enum, default_value_t = BoostArg::Size)]
    pub boost: BoostArg,

    /// How deep the content comparison goes
    #[arg(long, value_enum, default_value_t = ModeArg::Normal)]
    pub mode: ModeArg,

    /// Ordering inside duplicate groups (decides which file --keep-one keeps)
    #[arg(long, value_enum, default_value_t = SortArg::ShortestPath)]
    pub sort: SortArg,

    /// Keep one file per group and move the rest to the system trash
    #[arg(long)]
    pub keep_one: bool,

    /// Skip the confirmation prompt (only with --keep-one)
    #[arg(long)]
    pub force: bool,

    /// Save the results to a JSON file after the run
    #[arg(long, value_name = "FILE")]
    pub save_json: Option<PathBuf>,

    /// Load results from a JSON file instead of scanning
    #[arg(long, value_name = "FILE", conflicts_with = "input")]
    pub load_json: Option<PathBuf>,

    /// Emit stage-by-stage progress and statistics to stderr
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// CLI spelling of the deduplication mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Size and front hash only; fastest, may report false positives
    Fast,
    /// Size, front, middle and end hashes
    Normal,
    /// Size, front, middle and full content hash
    Full,
}

/// CLI spelling of the boost key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BoostArg {
    /// Group by size only
    Size,
    /// Group by size and extension
    Extension,
    /// Group by size and filename
    Filename,
    /// Group by size and fuzzy-normalized filename
    #[value(name = "fuzzy_filename")]
    FuzzyFilename,
}

/// CLI spelling of the in-group sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    /// Fewer path components win
    ShortestPath,
    /// Shorter filenames win
    ShortestFilename,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Fast => Mode::Fast,
            ModeArg::Normal => Mode::Normal,
            ModeArg::Full => Mode::Full,
        }
    }
}

impl From<BoostArg> for Boost {
    fn from(arg: BoostArg) -> Self {
        match arg {
            BoostArg::Size => Boost::Size,
            BoostArg::Extension => Boost::SizeExt,
            BoostArg::Filename => Boost::SizeFilename,
            BoostArg::FuzzyFilename => Boost::SizeFuzzyFilename,
        }
    }
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::ShortestPath => SortKey::ShortestPath,
            SortArg::ShortestFilename => SortKey::ShortestFilename,
        }
    }
}

/// Parse a size string with an optional `B`/`KB`/`MB`/`GB`/`TB` suffix.
/// Suffixes are powers of 1024; a bare number is bytes.
///
/// # Errors
///
/// Rejects empty strings, malformed numbers, and unknown suffixes.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("size cannot be empty".to_string());
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (num_str, suffix) = (&s[..split], s[split..].trim().to_uppercase());

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("invalid number: {num_str:?}"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" => 1 << 10,
        "MB" => 1 << 20,
        "GB" => 1 << 30,
        "TB" => 1 << 40,
        _ => return Err(format!("unknown size suffix: {suffix:?}")),
    };

    Ok((num * multiplier as f64) as u64)
}
