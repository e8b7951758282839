//! Destructive actions over duplicate groups.
//!
//! The core never calls the OS trash directly: the keep-one executor takes
//! the trash move as an injected function value, so the CLI wires in
//! [`system_trash`] while tests wire in recording or failing closures.

pub mod keep_one;

use std::path::Path;

pub use keep_one::{keep_one, KeepOneReport};

/// Trash adapter used by the CLI: moves a file to the operating-system
/// trash, mapping any backend error to its message.
pub fn system_trash(path: &Path) -> Result<(), String> {
    trash::delete(path).map_err(|e| e.to_string())
}
