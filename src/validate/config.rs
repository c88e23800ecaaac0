//! Config class validation pass.
//!
//! Follows the `configs` list on the plugin's registration class to each
//! declared config class and checks its shape: derivation from the config
//! base, the name attribute, and nested section classes with at least one
//! annotated field each. Config findings are mostly warnings; only an
//! undeclared or unresolvable config class is an error.

use std::path::{Path, PathBuf};

use crate::parse::{ClassDescriptor, SourceUnit};
use crate::rules::{
    CONFIGS_ATTR, CONFIG_BASE, CONFIG_NAME_ATTR, ENTRY_FILE, PLUGIN_BASE, SECTION_BASE,
};

use super::component::scan_for_class;
use super::{plugin_identity, Issue, IssueKind, ValidationResult};

/// Validate the plugin's declared config classes.
pub fn validate(plugin_path: &Path) -> ValidationResult {
    let mut result = ValidationResult::new("config");

    let Some(plugin_name) = plugin_identity(plugin_path) else {
        result.push(Issue::error(
            IssueKind::PluginIdentityUnknown,
            "cannot determine plugin identity",
        ));
        return result;
    };

    let entry = plugin_path.join(ENTRY_FILE);
    if !entry.exists() {
        result.push(Issue::error(
            IssueKind::EntryFileMissing,
            format!("plugin entry file not found: {ENTRY_FILE}"),
        ));
        return result;
    }

    let unit = match SourceUnit::from_file(&entry) {
        Ok(u) => u,
        Err(e) => {
            let mut issue = Issue::error(
                IssueKind::ParseFailure {
                    file: ENTRY_FILE.to_string(),
                },
                format!("failed to parse {ENTRY_FILE}: {e}"),
            )
            .with_file(ENTRY_FILE);
            if let Some(line) = e.line() {
                issue = issue.with_line(line);
            }
            result.push(issue);
            return result;
        }
    };

    let classes = unit.find_classes(Some(PLUGIN_BASE), None);
    let Some(plugin_class) = classes.first() else {
        // The component validator already reports the missing class.
        return result;
    };

    let declared: Vec<String> = plugin_class
        .attribute(CONFIGS_ATTR)
        .map(|attr| attr.list_names.clone())
        .unwrap_or_default();
    if declared.is_empty() {
        result.push(
            Issue::warning(
                IssueKind::NoConfigs,
                format!("plugin declares no config classes in {CONFIGS_ATTR}"),
            )
            .with_file(ENTRY_FILE)
            .with_suggestion(format!(
                "declare config classes on the plugin class: {CONFIGS_ATTR} = [MyConfig]"
            )),
        );
        return result;
    }

    for class_name in &declared {
        match resolve_config_class(plugin_path, &unit, &plugin_name, class_name) {
            Some((class, rel_path)) => check_config_class(&class, &rel_path, &mut result),
            None => result.push(
                Issue::error(
                    IssueKind::ConfigUnresolved {
                        class: class_name.clone(),
                    },
                    format!("config class {class_name} cannot be resolved"),
                )
                .with_file(ENTRY_FILE),
            ),
        }
    }
    result.push(Issue::info(format!(
        "checked {} declared config class(es)",
        declared.len()
    )));

    result
}

/// Find a declared config class: first in the entry file itself, then
/// through a plugin-local import of the same name, finally by scanning
/// the plugin tree for its definition.
fn resolve_config_class(
    plugin_path: &Path,
    entry_unit: &SourceUnit,
    plugin_name: &str,
    class_name: &str,
) -> Option<(ClassDescriptor, String)> {
    if let Some(class) = entry_unit
        .find_classes(None, Some(class_name))
        .into_iter()
        .next()
    {
        return Some((class, ENTRY_FILE.to_string()));
    }

    let file = imported_config_file(plugin_path, entry_unit, plugin_name, class_name)
        .or_else(|| scan_for_class(plugin_path, class_name))?;

    let rel_path = file
        .strip_prefix(plugin_path)
        .unwrap_or(&file)
        .to_string_lossy()
        .replace('\\', "/");
    let unit = SourceUnit::from_file(&file).ok()?;
    let class = unit.find_classes(None, Some(class_name)).into_iter().next()?;
    Some((class, rel_path))
}

/// File a plugin-local import of `class_name` points at, if any.
fn imported_config_file(
    plugin_path: &Path,
    entry_unit: &SourceUnit,
    plugin_name: &str,
    class_name: &str,
) -> Option<PathBuf> {
    let module = entry_unit
        .imported_names()
        .into_iter()
        .find(|(name, _)| name == class_name)
        .map(|(_, module)| module)?;
    let module = if module.starts_with('.') {
        module
    } else if let Some(rest) = module.strip_prefix(plugin_name) {
        rest.strip_prefix('.').map(|r| format!(".{r}"))?
    } else {
        return None;
    };

    let module_path = module.trim_start_matches('.').replace('.', "/");
    let file = plugin_path.join(format!("{module_path}.py"));
    if file.exists() {
        return Some(file);
    }
    let init = plugin_path.join(&module_path).join("__init__.py");
    init.exists().then_some(init)
}

fn check_config_class(class: &ClassDescriptor, rel_path: &str, result: &mut ValidationResult) {
    if class.base_class_name != CONFIG_BASE {
        result.push(
            Issue::error(
                IssueKind::ConfigBaseMismatch {
                    class: class.name.clone(),
                },
                format!(
                    "config class {} must derive {CONFIG_BASE}, found {:?}",
                    class.name, class.base_class_name
                ),
            )
            .with_file(rel_path.to_string())
            .with_line(class.span.start_line),
        );
        return;
    }

    let name_missing = match class.attribute(CONFIG_NAME_ATTR) {
        None => true,
        Some(attr) => attr.is_empty_value(),
    };
    if name_missing {
        result.push(
            Issue::warning(
                IssueKind::ConfigNameMissing {
                    class: class.name.clone(),
                },
                format!(
                    "config class {} should declare a non-empty {CONFIG_NAME_ATTR}",
                    class.name
                ),
            )
            .with_file(rel_path.to_string())
            .with_line(class.span.start_line)
            .with_suggestion(format!("add {CONFIG_NAME_ATTR} = '...' to the class")),
        );
    }

    let sections: Vec<&ClassDescriptor> = class
        .nested
        .iter()
        .filter(|nested| nested.base_class_name == SECTION_BASE)
        .collect();
    if sections.is_empty() {
        result.push(
            Issue::warning(
                IssueKind::NoConfigSections {
                    class: class.name.clone(),
                },
                format!(
                    "config class {} declares no {SECTION_BASE} sections",
                    class.name
                ),
            )
            .with_file(rel_path.to_string())
            .with_line(class.span.start_line),
        );
        return;
    }

    for section in sections {
        let fields = section.attributes.iter().filter(|a| a.annotated).count();
        if fields == 0 {
            result.push(
                Issue::warning(
                    IssueKind::EmptySection {
                        class: class.name.clone(),
                        section: section.name.clone(),
                    },
                    format!(
                        "section {}.{} declares no annotated fields",
                        class.name, section.name
                    ),
                )
                .with_file(rel_path.to_string())
                .with_line(section.span.start_line)
                .with_suggestion("declare at least one field, e.g. enabled: bool = True"),
            );
        }
    }
}
