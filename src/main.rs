//! keepone CLI entry point.

use clap::Parser;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use keepone::actions::{self, keep_one};
use keepone::cli::Cli;
use keepone::config::FilterConfig;
use keepone::dedup::{DedupOptions, DedupResult, Deduplicator, Mode};
use keepone::error::ExitCode;
use keepone::output::{write_groups, write_keep_one_preview, StderrSink};
use keepone::ranker::{rank_all, SortKey};
use keepone::scanner::{ScanParams, Walker};
use keepone::signal::{self, StopToken};
use keepone::{logging, store};

fn main() {
    std::process::exit(run().as_i32());
}

fn run() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version surface as "errors" from try_parse but
            // exit cleanly; real usage problems exit 1.
            let code = if e.use_stderr() {
                ExitCode::UsageError
            } else {
                ExitCode::Success
            };
            let _ = e.print();
            return code;
        }
    };

    logging::init_logging(cli.verbose, cli.quiet);

    if let Err(message) = validate(&cli) {
        eprintln!("error: {message}");
        return ExitCode::UsageError;
    }

    let stop = match signal::install_handler() {
        Ok(token) => token,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::UsageError;
        }
    };

    match execute(&cli, &stop) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::UsageError
        }
    }
}

/// Argument checks beyond what clap expresses declaratively.
fn validate(cli: &Cli) -> Result<(), String> {
    if cli.force && !cli.keep_one {
        return Err("--force can only be used with --keep-one".to_string());
    }
    if cli.keep_one && !cli.force && !io::stdin().is_terminal() {
        return Err(
            "cannot prompt for confirmation in a non-interactive session; \
             use --force with --keep-one"
                .to_string(),
        );
    }
    if let (Some(min), Some(max)) = (cli.min_size, cli.max_size) {
        if max < min {
            return Err("maximum size cannot be less than minimum size".to_string());
        }
    }
    if let Some(ref input) = cli.input {
        if !input.exists() {
            return Err(format!("directory not found: {}", input.display()));
        }
        if !input.is_dir() {
            return Err(format!("not a directory: {}", input.display()));
        }
    }
    Ok(())
}

fn execute(cli: &Cli, stop: &StopToken) -> anyhow::Result<ExitCode> {
    let sink = StderrSink {
        verbose: cli.verbose,
    };
    let flag = stop.flag();
    let sort: SortKey = cli.sort.into();
    let requested_mode: Mode = cli.mode.into();

    let (mut result, params) = if let Some(ref load_path) = cli.load_json {
        let (loaded, params) = store::load(load_path)?;
        if loaded.mode != requested_mode {
            // Stored fingerprints belong to a different pipeline depth;
            // re-scan and re-hash under the requested mode.
            log::info!(
                "stored results used mode {}, re-running as {}",
                loaded.mode.as_str(),
                requested_mode.as_str()
            );
            let result = scan_and_dedup(cli, &params, &flag, &sink)?;
            (result, params)
        } else {
            (loaded, params)
        }
    } else {
        let params = build_params(cli)?;
        let result = scan_and_dedup(cli, &params, &flag, &sink)?;
        (result, params)
    };

    rank_all(&mut result, sort);

    if let Some(ref save_path) = cli.save_json {
        store::save(save_path, &result, &params)?;
    }

    if result.partial || stop.is_stopped() {
        if !cli.quiet {
            eprintln!("interrupted; partial results follow");
            write_groups(&mut io::stdout().lock(), &result)?;
        }
        return Ok(ExitCode::Interrupted);
    }

    if cli.keep_one {
        return run_keep_one(cli, result, sort, stop);
    }

    if !cli.quiet {
        write_groups(&mut io::stdout().lock(), &result)?;
    }
    Ok(ExitCode::Success)
}

fn build_params(cli: &Cli) -> anyhow::Result<ScanParams> {
    let Some(ref input) = cli.input else {
        anyhow::bail!("--input is required unless --load-json is given");
    };
    let root = input.canonicalize()?;

    let filters = FilterConfig::default()
        .with_min_size(cli.min_size.unwrap_or(1))
        .with_max_size(cli.max_size)
        .with_extensions(&cli.extensions)
        .with_excluded_dirs(canonicalize_dirs(&cli.excluded_dirs, "excluded"))
        .with_priority_dirs(canonicalize_dirs(&cli.priority_dirs, "priority"));

    Ok(ScanParams { root, filters })
}

/// Resolve directory arguments; a directory that cannot be resolved is
/// kept verbatim (its ancestry match simply never fires) with a warning.
fn canonicalize_dirs(dirs: &[PathBuf], role: &str) -> Vec<PathBuf> {
    dirs.iter()
        .map(|dir| match dir.canonicalize() {
            Ok(canonical) => canonical,
            Err(e) => {
                log::warn!("{role} directory {}: {e}", dir.display());
                dir.clone()
            }
        })
        .collect()
}

fn scan_and_dedup(
    cli: &Cli,
    params: &ScanParams,
    flag: &std::sync::Arc<std::sync::atomic::AtomicBool>,
    sink: &StderrSink,
) -> anyhow::Result<DedupResult> {
    let walker = Walker::new(&params.root, params.filters.clone());
    let scan = walker.scan(flag, sink)?;
    log::debug!(
        "scanned {} file(s), {} byte(s)",
        scan.files.len(),
        scan.total_bytes
    );

    let options = DedupOptions::default()
        .with_mode(cli.mode.into())
        .with_boost(cli.boost.into());
    let engine = Deduplicator::new(options)?;
    Ok(engine.run(scan.files, flag, sink))
}

fn run_keep_one(
    cli: &Cli,
    result: DedupResult,
    sort: SortKey,
    stop: &StopToken,
) -> anyhow::Result<ExitCode> {
    if result.groups.is_empty() {
        if !cli.quiet {
            println!("No duplicate groups found.");
        }
        return Ok(ExitCode::Success);
    }

    let victims = result.duplicate_files() - result.groups.len();
    let mut stdout = io::stdout().lock();

    if !cli.quiet {
        write_keep_one_preview(&mut stdout, &result)?;
    }

    if !cli.force && !confirm(&mut stdout, victims)? {
        println!("Deletion cancelled.");
        return Ok(ExitCode::Success);
    }

    let flag = stop.flag();
    let (_survivors, report) = keep_one(result, sort, &actions::system_trash, &flag);

    if !cli.quiet {
        println!(
            "Moved {} file(s) to trash{}",
            report.moved,
            if report.failed() > 0 {
                format!(", {} failed", report.failed())
            } else {
                String::new()
            }
        );
        for (path, reason) in &report.failures {
            eprintln!("failed: {}: {reason}", path.display());
        }
    }

    if report.cancelled {
        Ok(ExitCode::Interrupted)
    } else if report.failed() > 0 {
        Ok(ExitCode::DeleteError)
    } else {
        Ok(ExitCode::Success)
    }
}

fn confirm(out: &mut impl Write, victims: usize) -> anyhow::Result<bool> {
    write!(out, "Move {victims} file(s) to trash? [y/N]: ")?;
    out.flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
