//! Validation issue model and validator orchestration.
//!
//! Each validator is an independent pass over the plugin directory that
//! produces a [`ValidationResult`]. Issues carry a structured
//! [`IssueKind`] next to the human-readable message; the fix engine
//! dispatches on the kind tag only, so messages can be reworded freely
//! without disabling fixes.

pub mod component;
pub mod config;
pub mod metadata;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::parse::SourceUnit;
use crate::rules::{ENTRY_FILE, PLUGIN_BASE, PLUGIN_NAME_ATTR};

/// Severity levels for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Error => write!(f, "error"),
            Level::Warning => write!(f, "warning"),
            Level::Info => write!(f, "info"),
        }
    }
}

/// Structured identity of an issue.
///
/// A closed set of variants with typed fields; the free-text message on
/// [`Issue`] is display-only. Fixable kinds carry everything the fix
/// engine needs to locate and perform the edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    // Manifest
    ManifestMissing,
    ManifestInvalidJson,
    ManifestKeyMissing { key: String },
    ManifestKeyRecommended { key: String },
    ManifestFieldShape { field: String },
    ManifestVersionFormat { version: String },
    ManifestEntryPointMissing { entry_point: String },

    // Plugin / component structure
    PluginIdentityUnknown,
    EntryFileMissing,
    ParseFailure { file: String },
    PluginClassMissing,
    RegistrationSignature { class: String },
    MissingAttribute { class: String, attribute: String, file: String },
    EmptyAttribute { class: String, attribute: String },
    MissingMethod { class: String, method: String, is_async: bool, file: String },
    StubMethod { class: String, method: String },
    WrongAsync { class: String, method: String, should_be_async: bool, file: String },
    ParamMismatch { class: String, method: String, expected: Vec<String>, file: String },
    ReturnTypeMismatch { class: String, method: String, expected: String, file: String },
    NoComponents,
    DiscoveryUnsupported,
    ComponentUnresolved { class: String },
    ClassNotFound { class: String, file: String },
    UnknownBaseClass { class: String, base: String, file: String },

    // Config structure
    NoConfigs,
    ConfigUnresolved { class: String },
    ConfigBaseMismatch { class: String },
    ConfigNameMissing { class: String },
    NoConfigSections { class: String },
    EmptySection { class: String, section: String },

    // Non-actionable observations
    Note,
}

/// A single validation issue.
///
/// Append-only once created; never references mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub level: Level,
    #[serde(flatten)]
    pub kind: IssueKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Issue {
    pub fn new(level: Level, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            level,
            kind,
            message: message.into(),
            file_path: None,
            line_number: None,
            suggestion: None,
        }
    }

    pub fn error(kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(Level::Error, kind, message)
    }

    pub fn warning(kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(Level::Warning, kind, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Level::Info, IssueKind::Note, message)
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file_path = Some(file.into());
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line_number = Some(line);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Ordered issues from one validator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub validator: String,
    pub issues: Vec<Issue>,
}

impl ValidationResult {
    pub fn new(validator: impl Into<String>) -> Self {
        Self {
            validator: validator.into(),
            issues: Vec::new(),
        }
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// True iff the run produced zero error-level issues.
    pub fn success(&self) -> bool {
        !self.issues.iter().any(|i| i.level == Level::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.level == Level::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.level == Level::Warning)
    }
}

/// Aggregated output of several validator runs.
///
/// Results are concatenated, not merged in place; ordering is imposed here
/// (validator run order, then emission order) so reports are deterministic
/// regardless of how the passes executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub results: Vec<ValidationResult>,
}

impl RunReport {
    pub fn new(results: Vec<ValidationResult>) -> Self {
        Self { results }
    }

    pub fn success(&self) -> bool {
        self.results.iter().all(|r| r.success())
    }

    pub fn all_issues(&self) -> impl Iterator<Item = &Issue> {
        self.results.iter().flat_map(|r| r.issues.iter())
    }

    pub fn error_count(&self) -> usize {
        self.all_issues()
            .filter(|i| i.level == Level::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.all_issues()
            .filter(|i| i.level == Level::Warning)
            .count()
    }
}

/// Run all three validators against a plugin directory and aggregate.
pub fn run_all(plugin_path: &Path) -> RunReport {
    RunReport::new(vec![
        metadata::validate(plugin_path),
        component::validate(plugin_path),
        config::validate(plugin_path),
    ])
}

/// Determine the plugin's identity: the `plugin_name` attribute of the
/// `BasePlugin` subclass in the entry file when parseable, else the
/// directory name. `None` only when the path is not a usable directory,
/// which each validator treats as its own immediate error.
pub fn plugin_identity(plugin_path: &Path) -> Option<String> {
    if !plugin_path.is_dir() {
        return None;
    }
    let entry = plugin_path.join(ENTRY_FILE);
    if entry.exists() {
        if let Ok(unit) = SourceUnit::from_file(&entry) {
            if let Some(name) = unit.class_attribute(PLUGIN_BASE, PLUGIN_NAME_ATTR) {
                if !name.is_empty() {
                    return Some(name);
                }
            }
        }
    }
    plugin_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_flag() {
        let mut result = ValidationResult::new("test");
        assert!(result.success());
        result.push(Issue::warning(IssueKind::NoComponents, "no components"));
        assert!(result.success());
        result.push(Issue::error(IssueKind::EntryFileMissing, "missing"));
        assert!(!result.success());
    }

    #[test]
    fn test_report_aggregation_keeps_order() {
        let mut a = ValidationResult::new("a");
        a.push(Issue::error(IssueKind::EntryFileMissing, "first"));
        let mut b = ValidationResult::new("b");
        b.push(Issue::warning(IssueKind::NoConfigs, "second"));

        let report = RunReport::new(vec![a, b]);
        let messages: Vec<&str> = report.all_issues().map(|i| i.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
        assert!(!report.success());
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.warning_count(), 1);
    }

    #[test]
    fn test_issue_kind_serializes_with_tag() {
        let issue = Issue::error(
            IssueKind::MissingAttribute {
                class: "MyAction".into(),
                attribute: "action_name".into(),
                file: "plugin.py".into(),
            },
            "missing attribute",
        );
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["kind"], "missing_attribute");
        assert_eq!(json["class"], "MyAction");
        assert_eq!(json["level"], "error");
    }
}
