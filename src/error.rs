//! Exit codes and top-level error classification.

/// Process exit codes for the keepone CLI.
///
/// - 0: Success (scan completed, with or without duplicates)
/// - 1: Usage error (invalid arguments or filter values; nothing ran)
/// - 2: One or more files failed to move to trash during `--keep-one`
/// - 130: Interrupted by the user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Run completed normally.
    Success = 0,
    /// Invalid CLI arguments or filter values.
    UsageError = 1,
    /// At least one trash move failed during deletion.
    DeleteError = 2,
    /// The stop flag was observed; a partial result was returned.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
