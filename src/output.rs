//! Terminal output: group listings, keep-one previews, and the stderr
//! progress sink.

use bytesize::ByteSize;
use std::io::{self, Write};

use crate::dedup::DedupResult;
use crate::progress::{ProgressEvent, ProgressSink};

/// Write the duplicate group listing to stdout.
///
/// Each group is preceded by a blank line:
///
/// ```text
/// Group 1 (size=1024, members=3):
/// * /priority/file.txt
/// /other/file.txt
/// /third/file.txt
/// ```
///
/// Priority members are prefixed with `*`.
pub fn write_groups<W: Write>(out: &mut W, result: &DedupResult) -> io::Result<()> {
    if result.groups.is_empty() {
        writeln!(out, "No duplicate groups found.")?;
        return Ok(());
    }

    for (index, group) in result.groups.iter().enumerate() {
        writeln!(out)?;
        writeln!(
            out,
            "Group {} (size={}, members={}):",
            index + 1,
            group.size,
            group.members.len()
        )?;
        for member in &group.members {
            if member.priority {
                writeln!(out, "* {}", member.path.display())?;
            } else {
                writeln!(out, "{}", member.path.display())?;
            }
        }
    }

    writeln!(out)?;
    writeln!(
        out,
        "{} group(s), {} file(s), {} recoverable",
        result.groups.len(),
        result.duplicate_files(),
        ByteSize(result.recoverable_bytes())
    )?;
    Ok(())
}

/// Write the keep-one preview: which file each group keeps, which it
/// deletes. Shown before the confirmation prompt.
pub fn write_keep_one_preview<W: Write>(out: &mut W, result: &DedupResult) -> io::Result<()> {
    let mut to_delete = 0usize;
    let mut bytes = 0u64;

    for (index, group) in result.groups.iter().enumerate() {
        writeln!(out)?;
        writeln!(
            out,
            "Group {} (size={}, members={}):",
            index + 1,
            group.size,
            group.members.len()
        )?;
        for (position, member) in group.members.iter().enumerate() {
            let marker = if position == 0 { "[KEEP]" } else { "[DEL] " };
            writeln!(out, "  {} {}", marker, member.path.display())?;
            if position > 0 {
                to_delete += 1;
                bytes += member.size;
            }
        }
    }

    writeln!(out)?;
    writeln!(
        out,
        "Keep one file per group: {} file(s) to trash, {} freed",
        to_delete,
        ByteSize(bytes)
    )?;
    Ok(())
}

/// Progress sink for the CLI: progress lines on stderr when verbose.
///
/// Warnings are not echoed here; the walker and engine already route them
/// through the logger, which writes to stderr at warn level.
#[derive(Debug, Default)]
pub struct StderrSink {
    /// Emit per-stage progress lines.
    pub verbose: bool,
}

impl ProgressSink for StderrSink {
    fn emit(&self, event: ProgressEvent) {
        if !self.verbose {
            return;
        }
        match event {
            ProgressEvent::ScanProgress { files_seen } => {
                eprintln!("  [scan] {files_seen} files");
            }
            ProgressEvent::StageProgress { stage, done, total } => {
                eprintln!("  [{stage}] {done}/{total}");
            }
            ProgressEvent::Warning { .. } => {}
            ProgressEvent::Done { summary } => {
                eprintln!(
                    "  done: {} files scanned, {} group(s), {} recoverable",
                    summary.files_scanned,
                    summary.groups,
                    ByteSize(summary.recoverable_bytes)
                );
            }
        }
    }
}
