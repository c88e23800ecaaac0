//! Output formatting for validation results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption

use colored::*;
use serde::Serialize;

use crate::fix::FixOutcome;
use crate::validate::{Issue, Level, RunReport, ValidationResult};

/// Top-level JSON report structure.
#[derive(Serialize)]
pub struct JsonReport<'a> {
    pub version: String,
    pub path: String,
    pub success: bool,
    pub errors: usize,
    pub warnings: usize,
    pub results: &'a [ValidationResult],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixes: Option<&'a FixOutcome>,
}

/// Write results in JSON format.
pub fn write_json(path: &str, report: &RunReport, fixes: Option<&FixOutcome>) -> anyhow::Result<()> {
    let json_report = JsonReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        path: path.to_string(),
        success: report.success(),
        errors: report.error_count(),
        warnings: report.warning_count(),
        results: &report.results,
        fixes,
    };
    let json = serde_json::to_string_pretty(&json_report)?;
    println!("{}", json);
    Ok(())
}

/// Write results in pretty (human-readable) format.
pub fn write_pretty(path: &str, report: &RunReport, fixes: Option<&FixOutcome>) {
    println!();
    print!("  ");
    print!("{}", "plugcheck".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Plugin: ".dimmed());
    println!("{}", path);
    println!();

    write_result_summary(report);
    println!();

    for result in &report.results {
        write_validator_section(result);
    }

    if let Some(fixes) = fixes {
        write_fix_summary(fixes);
    }

    write_final_status(report);
    println!();
}

fn write_result_summary(report: &RunReport) {
    if report.success() {
        print!("  {}", "✓ PASS".green());
    } else {
        print!("  {}", "✗ FAIL".red());
    }
    let errors = report.error_count();
    let warnings = report.warning_count();
    print!("  {} error{}", errors, plural(errors));
    print!(", {} warning{}", warnings, plural(warnings));
    println!();
}

fn write_validator_section(result: &ValidationResult) {
    if result.issues.is_empty() {
        println!("  {} {}", result.validator.bold(), "ok".green());
        println!();
        return;
    }

    println!(
        "  {} ({} issue{}):",
        result.validator.bold(),
        result.issues.len(),
        plural(result.issues.len())
    );
    println!();
    for issue in &result.issues {
        write_issue(issue);
    }
}

fn write_issue(issue: &Issue) {
    write_level_tag(issue.level);
    print!("   ");
    if let Some(file) = &issue.file_path {
        print!("{}", file.blue());
        if let Some(line) = issue.line_number {
            print!("{}", format!(":{}", line).dimmed());
        }
        print!("  ");
    }
    println!("{}", issue.message);
    if let Some(suggestion) = &issue.suggestion {
        for line in suggestion.lines() {
            println!("            {}", line.dimmed());
        }
    }
    println!();
}

fn write_level_tag(level: Level) {
    match level {
        Level::Error => print!("    {} ", "ERROR".red()),
        Level::Warning => print!("    {} ", "WARN ".yellow()),
        Level::Info => print!("    {} ", "INFO ".blue()),
    }
}

fn write_fix_summary(fixes: &FixOutcome) {
    if !fixes.applied.is_empty() {
        println!(
            "  {} ({}):",
            "Fixes applied".bold(),
            fixes.applied.len()
        );
        for fix in &fixes.applied {
            match &fix.file {
                Some(file) => println!("    {} {}", file.blue(), fix.description),
                None => println!("    {}", fix.description),
            }
        }
        println!();
    }
    if !fixes.failed.is_empty() {
        println!("  {} ({}):", "Fixes failed".bold(), fixes.failed.len());
        for fix in &fixes.failed {
            println!("    {}", fix.description);
            println!("      {}", format!("reason: {}", fix.reason).dimmed());
        }
        println!();
    }
}

fn write_final_status(report: &RunReport) {
    print!("  ");
    if report.success() {
        print!("{}", "PASSED".green());
    } else {
        print!("{}", "FAILED".red());
    }
    println!();
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
