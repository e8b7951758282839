//! Logging setup for the keepone CLI.
//!
//! Uses the `log` facade with an `env_logger` backend. The level is chosen
//! from (in priority order):
//!
//! 1. `RUST_LOG` environment variable, if set
//! 2. `--quiet` (errors only) or `--verbose` (debug)
//! 3. Default: warn

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Initialize the logging subsystem from CLI verbosity flags.
///
/// Must be called once, before any log calls are made.
pub fn init_logging(verbose: bool, quiet: bool) {
    let mut builder = Builder::new();

    if env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }

    // Compact format: level + message on stderr, no timestamps. Progress and
    // warnings share stderr with the progress sink, so keep lines short.
    builder.format(|buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
    });

    builder.init();
}

fn determine_level(verbose: bool, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}
