//! Auto-fix engine.
//!
//! Consumes validation issues and repairs the fixable ones in place. Every
//! fix dispatches on the structured [`IssueKind`] of the issue, never on
//! message text, and every source repair is a byte-range edit against the
//! original file, so formatting outside the edited spans survives
//! untouched. Issues whose precondition no longer holds (already fixed by
//! an earlier run, or fixed as a side effect of another edit) are skipped,
//! which makes the engine idempotent.

pub mod edits;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::manifest::Manifest;
use crate::parse::SourceUnit;
use crate::rules::MANIFEST_FILE;
use crate::validate::{Issue, IssueKind};

use edits::EditSet;

/// One successfully applied fix.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedFix {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// One fix that could not be applied.
#[derive(Debug, Clone, Serialize)]
pub struct FailedFix {
    pub description: String,
    pub reason: String,
}

/// Accounting for a fix run, reported separately from validation issues.
#[derive(Debug, Default, Serialize)]
pub struct FixOutcome {
    pub applied: Vec<AppliedFix>,
    pub failed: Vec<FailedFix>,
}

impl FixOutcome {
    fn applied(&mut self, issue: &Issue) {
        self.applied.push(AppliedFix {
            description: issue.message.clone(),
            file: issue.file_path.clone(),
        });
    }

    fn failed(&mut self, issue: &Issue, reason: impl Into<String>) {
        self.failed.push(FailedFix {
            description: issue.message.clone(),
            reason: reason.into(),
        });
    }
}

/// Apply every fixable issue against the plugin directory.
pub fn apply_fixes(plugin_path: &Path, issues: &[Issue]) -> FixOutcome {
    let mut outcome = FixOutcome::default();
    let mut by_file: BTreeMap<&str, Vec<&Issue>> = BTreeMap::new();

    for issue in issues {
        match &issue.kind {
            IssueKind::ManifestMissing => match write_minimal_manifest(plugin_path) {
                Ok(true) => outcome.applied(issue),
                Ok(false) => {}
                Err(e) => outcome.failed(issue, e.to_string()),
            },
            kind => {
                if let Some(file) = source_fix_target(kind) {
                    by_file.entry(file).or_default().push(issue);
                }
            }
        }
    }

    let mut touched_sources = false;
    for (file, file_issues) in by_file {
        if fix_source_file(plugin_path, file, &file_issues, &mut outcome) {
            touched_sources = true;
        }
    }
    if touched_sources {
        sort_imports(plugin_path, &mut outcome);
    }

    outcome
}

/// Relative file a source fix applies to, or `None` for unfixable kinds.
fn source_fix_target(kind: &IssueKind) -> Option<&str> {
    match kind {
        IssueKind::MissingAttribute { file, .. }
        | IssueKind::MissingMethod { file, .. }
        | IssueKind::WrongAsync { file, .. }
        | IssueKind::ParamMismatch { file, .. }
        | IssueKind::ReturnTypeMismatch { file, .. } => Some(file),
        _ => None,
    }
}

/// Create `manifest.json` unless one already exists. Returns whether a file
/// was written.
fn write_minimal_manifest(plugin_path: &Path) -> Result<bool> {
    let path = plugin_path.join(MANIFEST_FILE);
    if path.exists() {
        return Ok(false);
    }
    let manifest = Manifest::minimal(plugin_path);
    fs::write(&path, manifest.to_json()?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(true)
}

/// Apply all fixes targeting one source file with a single parse and a
/// single write. Returns whether the file was rewritten.
fn fix_source_file(
    plugin_path: &Path,
    file: &str,
    issues: &[&Issue],
    outcome: &mut FixOutcome,
) -> bool {
    let path = plugin_path.join(file);
    let unit = match SourceUnit::from_file(&path) {
        Ok(u) => u,
        Err(e) => {
            for issue in issues {
                outcome.failed(issue, format!("cannot parse {file}: {e}"));
            }
            return false;
        }
    };

    let mut edits = EditSet::new();
    let mut planned: Vec<&Issue> = Vec::new();
    for issue in issues {
        match plan_fix(&unit, &issue.kind, &mut edits) {
            Ok(true) => planned.push(issue),
            Ok(false) => {} // precondition no longer holds
            Err(reason) => outcome.failed(issue, reason),
        }
    }
    if edits.is_empty() {
        return false;
    }

    let rewritten = match edits.apply(unit.source()) {
        Ok(text) => text,
        Err(e) => {
            for issue in planned {
                outcome.failed(issue, e.to_string());
            }
            return false;
        }
    };
    if let Err(e) = fs::write(&path, rewritten) {
        for issue in planned {
            outcome.failed(issue, format!("cannot write {file}: {e}"));
        }
        return false;
    }
    for issue in planned {
        outcome.applied(issue);
    }
    true
}

/// Plan the edit for one issue. `Ok(true)` when an edit was added,
/// `Ok(false)` when the file already satisfies the check.
fn plan_fix(unit: &SourceUnit, kind: &IssueKind, edits: &mut EditSet) -> Result<bool, String> {
    match kind {
        IssueKind::MissingAttribute {
            class, attribute, ..
        } => plan_attribute_insert(unit, class, attribute, edits),
        IssueKind::MissingMethod {
            class,
            method,
            is_async,
            ..
        } => plan_method_insert(unit, class, method, *is_async, edits),
        IssueKind::WrongAsync {
            class,
            method,
            should_be_async,
            ..
        } => plan_async_toggle(unit, class, method, *should_be_async, edits),
        IssueKind::ParamMismatch {
            class,
            method,
            expected,
            ..
        } => plan_param_rewrite(unit, class, method, expected, edits),
        IssueKind::ReturnTypeMismatch {
            class,
            method,
            expected,
            ..
        } => plan_return_rewrite(unit, class, method, expected, edits),
        _ => Ok(false),
    }
}

fn plan_attribute_insert(
    unit: &SourceUnit,
    class: &str,
    attribute: &str,
    edits: &mut EditSet,
) -> Result<bool, String> {
    let descriptor = unit
        .find_classes(None, Some(class))
        .into_iter()
        .next()
        .ok_or_else(|| format!("class {class} not found"))?;
    if descriptor.attribute(attribute).is_some() {
        return Ok(false);
    }

    let node = unit
        .class_node(class)
        .ok_or_else(|| format!("class {class} not found"))?;
    let body = node
        .child_by_field_name("body")
        .ok_or_else(|| format!("class {class} has no body"))?;
    let first = body
        .named_child(0)
        .ok_or_else(|| format!("class {class} has an empty body"))?;
    let indent = " ".repeat(first.start_position().column);
    let line = format!("{indent}{attribute} = \"{}\"\n", placeholder_value(attribute));

    // Insert before the first statement that is not the docstring, keeping
    // the new attribute at the top of the class body.
    let mut anchor = None;
    let mut walker = body.walk();
    for stmt in body.named_children(&mut walker) {
        let is_docstring = stmt.kind() == "expression_statement"
            && stmt
                .named_child(0)
                .map(|n| n.kind() == "string")
                .unwrap_or(false);
        if !is_docstring {
            anchor = Some(stmt);
            break;
        }
    }
    match anchor {
        Some(stmt) => {
            let line_start = unit.source()[..stmt.start_byte()]
                .rfind('\n')
                .map(|i| i + 1)
                .unwrap_or(0);
            edits.insert(line_start, line);
        }
        None => {
            // docstring-only body
            edits.insert(body.end_byte(), format!("\n{}", line.trim_end()));
        }
    }
    Ok(true)
}

fn plan_method_insert(
    unit: &SourceUnit,
    class: &str,
    method: &str,
    is_async: bool,
    edits: &mut EditSet,
) -> Result<bool, String> {
    let descriptor = unit
        .find_classes(None, Some(class))
        .into_iter()
        .next()
        .ok_or_else(|| format!("class {class} not found"))?;
    if descriptor.method(method).is_some() {
        return Ok(false);
    }

    let node = unit
        .class_node(class)
        .ok_or_else(|| format!("class {class} not found"))?;
    let body = node
        .child_by_field_name("body")
        .ok_or_else(|| format!("class {class} has no body"))?;
    let indent = body
        .named_child(0)
        .map(|n| " ".repeat(n.start_position().column))
        .unwrap_or_else(|| "    ".to_string());

    let (def_line, body_line) = method_template(method, is_async);
    edits.insert(
        body.end_byte(),
        format!("\n\n{indent}{def_line}\n{indent}    {body_line}"),
    );
    Ok(true)
}

fn plan_async_toggle(
    unit: &SourceUnit,
    class: &str,
    method: &str,
    should_be_async: bool,
    edits: &mut EditSet,
) -> Result<bool, String> {
    let node = unit
        .method_node(class, method)
        .ok_or_else(|| format!("method {class}.{method} not found"))?;

    let mut async_token = None;
    let mut def_token = None;
    let mut walker = node.walk();
    for child in node.children(&mut walker) {
        match child.kind() {
            "async" => async_token = Some(child),
            "def" => {
                def_token = Some(child);
                break;
            }
            _ => {}
        }
    }
    let def_token = def_token.ok_or_else(|| format!("method {class}.{method} has no def"))?;

    match (should_be_async, async_token) {
        (true, None) => {
            edits.insert(def_token.start_byte(), "async ");
            Ok(true)
        }
        (false, Some(token)) => {
            edits.replace(token.start_byte(), def_token.start_byte(), "");
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn plan_param_rewrite(
    unit: &SourceUnit,
    class: &str,
    method: &str,
    expected: &[String],
    edits: &mut EditSet,
) -> Result<bool, String> {
    let node = unit
        .method_node(class, method)
        .ok_or_else(|| format!("method {class}.{method} not found"))?;
    let parameters = node
        .child_by_field_name("parameters")
        .ok_or_else(|| format!("method {class}.{method} has no parameter list"))?;

    let mut parts = vec!["self".to_string()];
    parts.extend(expected.iter().cloned());
    let replacement = format!("({})", parts.join(", "));
    if unit.node_text(parameters) == replacement {
        return Ok(false);
    }
    edits.replace(parameters.start_byte(), parameters.end_byte(), replacement);
    Ok(true)
}

fn plan_return_rewrite(
    unit: &SourceUnit,
    class: &str,
    method: &str,
    expected: &str,
    edits: &mut EditSet,
) -> Result<bool, String> {
    let node = unit
        .method_node(class, method)
        .ok_or_else(|| format!("method {class}.{method} not found"))?;

    match node.child_by_field_name("return_type") {
        Some(annotation) => {
            if unit.node_text(annotation) == expected {
                return Ok(false);
            }
            edits.replace(annotation.start_byte(), annotation.end_byte(), expected);
        }
        None => {
            let parameters = node
                .child_by_field_name("parameters")
                .ok_or_else(|| format!("method {class}.{method} has no parameter list"))?;
            edits.insert(parameters.end_byte(), format!(" -> {expected}"));
        }
    }
    Ok(true)
}

/// Body template for an inserted method, `(def line, body line)`.
fn method_template(method: &str, is_async: bool) -> (String, String) {
    match method {
        "execute" => (
            "async def execute(self, *args, **kwargs) -> tuple[bool, str]:".to_string(),
            "return True, \"\"".to_string(),
        ),
        "get_components" => (
            "def get_components(self) -> list[type]:".to_string(),
            "return []".to_string(),
        ),
        "from_platform_message" => (
            "async def from_platform_message(self, raw: Any) -> MessageEnvelope:".to_string(),
            "raise NotImplementedError".to_string(),
        ),
        "get_bot_info" => (
            "async def get_bot_info(self) -> dict[str, Any]:".to_string(),
            "return {}".to_string(),
        ),
        "get_contents" => (
            "async def get_contents(self) -> list[str]:".to_string(),
            "return []".to_string(),
        ),
        "go_activate" => (
            "async def go_activate(self, llm_judge_model=None) -> bool:".to_string(),
            "return True".to_string(),
        ),
        "register_endpoints" => (
            "def register_endpoints(self) -> None:".to_string(),
            "return None".to_string(),
        ),
        other => {
            let prefix = if is_async { "async " } else { "" };
            (
                format!("{prefix}def {other}(self, *args, **kwargs):"),
                "raise NotImplementedError".to_string(),
            )
        }
    }
}

/// Placeholder value for an inserted attribute. Name-like fields get the
/// field name title-cased so the inserted value is non-empty and readable;
/// anything unrecognized gets an empty string the author must fill in.
fn placeholder_value(attribute: &str) -> String {
    if attribute.contains("version") {
        "0.1.0".to_string()
    } else if attribute == "name" || attribute.ends_with("_name") {
        title_case(attribute)
    } else if attribute == "description" || attribute.ends_with("_description") {
        "Description pending".to_string()
    } else {
        String::new()
    }
}

/// `action_name` -> `Action Name`.
fn title_case(field: &str) -> String {
    field
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize import order with ruff, best effort. A missing ruff binary is
/// not an error.
fn sort_imports(plugin_path: &Path, outcome: &mut FixOutcome) {
    let status = Command::new("ruff")
        .args(["check", "--select", "I", "--fix"])
        .arg(plugin_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Ok(status) = status {
        if status.success() {
            outcome.applied.push(AppliedFix {
                description: "normalized import order (ruff)".to_string(),
                file: None,
            });
        }
    }
}
