//! Command-line interface for plugcheck.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::fix;
use crate::report;
use crate::validate::{self, Issue};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Static structure validator for plugin projects.
///
/// Plugcheck inspects a plugin directory without importing or executing
/// any of its code: the manifest, the registration class, every registered
/// component, and declared config classes are checked against the
/// framework contract, and most structural gaps can be repaired in place
/// with --fix.
#[derive(Parser)]
#[command(name = "plugcheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a plugin directory
    Check(CheckArgs),
}

/// Arguments for the check command.
#[derive(Parser)]
pub struct CheckArgs {
    /// Path to the plugin directory
    pub path: PathBuf,

    /// Repair fixable issues in place, then re-validate
    #[arg(long)]
    pub fix: bool,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,
}

/// Run the check command.
pub fn run_check(args: &CheckArgs) -> anyhow::Result<i32> {
    if args.format != "pretty" && args.format != "json" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    let plugin_path = match args.path.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };
    if !plugin_path.is_dir() {
        eprintln!("Error: {:?} is not a directory", args.path);
        return Ok(EXIT_ERROR);
    }

    let mut run = validate::run_all(&plugin_path);
    let fixes = if args.fix {
        let issues: Vec<Issue> = run.all_issues().cloned().collect();
        let outcome = fix::apply_fixes(&plugin_path, &issues);
        // report against the repaired state
        run = validate::run_all(&plugin_path);
        Some(outcome)
    } else {
        None
    };

    let path_str = args.path.to_string_lossy().to_string();
    match args.format.as_str() {
        "json" => report::write_json(&path_str, &run, fixes.as_ref())?,
        _ => report::write_pretty(&path_str, &run, fixes.as_ref()),
    }

    if run.success() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}
