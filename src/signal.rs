//! Ctrl+C handling producing the shared stop flag.
//!
//! Every long-running operation in the crate takes a reference to an
//! `AtomicBool` stop flag and polls it cooperatively. This module owns the
//! flag and wires it to SIGINT so that a single Ctrl+C winds the whole
//! pipeline down: the scanner stops at the next directory boundary, hashing
//! stages stop before the next work item, and keep-one stops between files.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared cancellation flag. Single writer (the signal handler or a
/// controller), many readers.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    /// Create a token with the flag initially unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if a stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request cancellation.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clone of the underlying flag for passing into worker code.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

/// Error installing the SIGINT handler.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_TOKEN: OnceLock<StopToken> = OnceLock::new();

/// Install a Ctrl+C handler that sets the stop flag.
///
/// Safe to call more than once in a process (tests run in parallel); later
/// calls reuse the first token. If the hook cannot be registered because
/// some other component already owns SIGINT, an unhooked token is returned
/// so the rest of the pipeline still works.
pub fn install_handler() -> Result<StopToken, SignalError> {
    if let Some(token) = GLOBAL_TOKEN.get() {
        return Ok(token.clone());
    }

    let token = StopToken::new();
    let flag = token.flag();

    match ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let _ = writeln!(std::io::stderr(), "\nInterrupted, finishing up...");
        let _ = std::io::stderr().flush();
    }) {
        Ok(()) => {
            let _ = GLOBAL_TOKEN.set(token.clone());
            Ok(token)
        }
        Err(_) => {
            log::debug!("Ctrl+C handler already registered, using unhooked token");
            let fallback = StopToken::new();
            let _ = GLOBAL_TOKEN.set(fallback.clone());
            Ok(fallback)
        }
    }
}
