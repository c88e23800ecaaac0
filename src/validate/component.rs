//! Component structure validation pass.
//!
//! Validates the plugin's registration class, discovers its registered
//! components, resolves each component's source file, and checks every
//! component against the rule table for its base class. The validator
//! never executes plugin or framework code; everything is derived from
//! the parsed source and the static rule tables.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use crate::discover::{discover_components, ComponentDeclaration};
use crate::parse::{ClassDescriptor, MethodDescriptor, SourceUnit};
use crate::rules::{self, MethodSpec, ParamSpec, ENTRY_FILE, PLUGIN_BASE, PLUGIN_NAME_ATTR, REGISTRATION_METHOD};

use super::{plugin_identity, Issue, IssueKind, ValidationResult};

/// Validate the plugin's registration class and all registered components.
pub fn validate(plugin_path: &Path) -> ValidationResult {
    let mut result = ValidationResult::new("component");

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

    validate_plugin_class(&unit, &mut result);

    let discovery = discover_components(&unit, &plugin_name);
    if discovery.unsupported_return {
        result.push(
            Issue::warning(
                IssueKind::DiscoveryUnsupported,
                format!("{REGISTRATION_METHOD}() returns a shape that cannot be evaluated statically"),
            )
            .with_file(ENTRY_FILE)
            .with_suggestion("return a literal list of component classes, e.g. return [MyAction, MyTool]"),
        );
        return result;
    }
    if discovery.components.is_empty() {
        result.push(
            Issue::warning(IssueKind::NoComponents, "no registered components found")
                .with_file(ENTRY_FILE)
                .with_suggestion(format!(
                    "return component classes from {REGISTRATION_METHOD}(), e.g. return [MyAction, MyTool]"
                )),
        );
        return result;
    }

    for declaration in &discovery.components {
        validate_component(plugin_path, declaration, &mut result);
    }
    result.push(Issue::info(format!(
        "checked {} registered component(s)",
        discovery.components.len()
    )));

    result
}

/// Check the registration class itself: identity attribute plus the
/// registration method's shape.
fn validate_plugin_class(unit: &SourceUnit, result: &mut ValidationResult) {
    let classes = unit.find_classes(Some(PLUGIN_BASE), None);
    let Some(class) = classes.first() else {
        result.push(
            Issue::warning(
                IssueKind::PluginClassMissing,
                format!("no class deriving {PLUGIN_BASE} found"),
            )
            .with_file(ENTRY_FILE)
            .with_suggestion(format!("the plugin's main class should derive {PLUGIN_BASE}")),
        );
        return;
    };

    match class.attribute(PLUGIN_NAME_ATTR) {
        None => result.push(
            Issue::error(
                IssueKind::MissingAttribute {
                    class: class.name.clone(),
                    attribute: PLUGIN_NAME_ATTR.to_string(),
                    file: ENTRY_FILE.to_string(),
                },
                format!(
                    "plugin class {} is missing the required attribute {PLUGIN_NAME_ATTR}",
                    class.name
                ),
            )
            .with_file(ENTRY_FILE)
            .with_line(class.span.start_line)
            .with_suggestion(format!(
                "add {PLUGIN_NAME_ATTR} = '...' to the class, or run 'plugcheck check --fix'"
            )),
        ),
        Some(attr) if attr.is_empty_value() => result.push(
            Issue::error(
                IssueKind::EmptyAttribute {
                    class: class.name.clone(),
                    attribute: PLUGIN_NAME_ATTR.to_string(),
                },
                format!("plugin class {} has an empty {PLUGIN_NAME_ATTR}", class.name),
            )
            .with_file(ENTRY_FILE)
            .with_line(attr.span.start_line),
        ),
        Some(_) => {}
    }

    match class.method(REGISTRATION_METHOD) {
        None => result.push(
            Issue::error(
                IssueKind::MissingMethod {
                    class: class.name.clone(),
                    method: REGISTRATION_METHOD.to_string(),
                    is_async: false,
                    file: ENTRY_FILE.to_string(),
                },
                format!(
                    "plugin class {} is missing the required method {REGISTRATION_METHOD}",
                    class.name
                ),
            )
            .with_file(ENTRY_FILE)
            .with_line(class.span.start_line)
            .with_suggestion(format!(
                "implement:\n    def {REGISTRATION_METHOD}(self) -> list[type]:\n        return [] \
                 | or run 'plugcheck check --fix'"
            )),
        ),
        Some(method) => {
            if method.params.len() != 1 {
                result.push(
                    Issue::warning(
                        IssueKind::RegistrationSignature {
                            class: class.name.clone(),
                        },
                        format!(
                            "{}.{REGISTRATION_METHOD} should take no parameters besides the receiver: \
                             def {REGISTRATION_METHOD}(self) -> list[type]",
                            class.name
                        ),
                    )
                    .with_file(ENTRY_FILE)
                    .with_line(method.span.start_line),
                );
            }
            if method.return_annotation.is_none() {
                result.push(
                    Issue::warning(
                        IssueKind::ReturnTypeMismatch {
                            class: class.name.clone(),
                            method: REGISTRATION_METHOD.to_string(),
                            expected: "list[type]".to_string(),
                            file: ENTRY_FILE.to_string(),
                        },
                        format!(
                            "{}.{REGISTRATION_METHOD} is missing a return type annotation",
                            class.name
                        ),
                    )
                    .with_file(ENTRY_FILE)
                    .with_line(method.span.start_line)
                    .with_suggestion("add: -> list[type]"),
                );
            }
        }
    }
}

/// Validate a single discovered component.
fn validate_component(
    plugin_path: &Path,
    declaration: &ComponentDeclaration,
    result: &mut ValidationResult,
) {
    let class_name = &declaration.class_name;

    let Some(component_file) =
        resolve_component_file(plugin_path, &declaration.import_path, class_name)
    else {
        result.push(
            Issue::warning(
                IssueKind::ComponentUnresolved {
                    class: class_name.clone(),
                },
                format!("cannot locate the source file of component {class_name}"),
            )
            .with_file(ENTRY_FILE),
        );
        return;
    };
    let rel_path = relative_path(plugin_path, &component_file);

    let unit = match SourceUnit::from_file(&component_file) {
        Ok(u) => u,
        Err(e) => {
            let mut issue = Issue::error(
                IssueKind::ParseFailure {
                    file: rel_path.clone(),
                },
                format!("failed to parse component file {rel_path}: {e}"),
            )
            .with_file(rel_path);
            if let Some(line) = e.line() {
                issue = issue.with_line(line);
            }
            result.push(issue);
            return;
        }
    };

    let classes = unit.find_classes(None, Some(class_name));
    let Some(class) = classes.first() else {
        let defined: Vec<String> = unit.classes().into_iter().map(|c| c.name).collect();
        let listing = if defined.is_empty() {
            "(none)".to_string()
        } else {
            defined.join(", ")
        };
        result.push(
            Issue::error(
                IssueKind::ClassNotFound {
                    class: class_name.clone(),
                    file: rel_path.clone(),
                },
                format!("class {class_name} is not defined in {rel_path}"),
            )
            .with_file(rel_path)
            .with_suggestion(format!("classes actually defined in the file: {listing}")),
        );
        return;
    };

    let base = &class.base_class_name;
    let Some(entry) = rules::lookup(base) else {
        // Fail closed: a base the rule table does not know cannot be checked.
        result.push(
            Issue::error(
                IssueKind::UnknownBaseClass {
                    class: class_name.clone(),
                    base: base.clone(),
                    file: rel_path.clone(),
                },
                format!("component {class_name} derives unknown base class {base:?}"),
            )
            .with_file(rel_path)
            .with_line(class.span.start_line),
        );
        return;
    };

    check_required_attributes(class, entry.required_attributes, &rel_path, result);
    check_required_methods(class, entry, &rel_path, result);
}

/// Resolve the defining file of a component.
///
/// Tiers: co-located with the entry file when there is no import path;
/// relative module path to file path; package `__init__.py`; last-resort
/// scan of every `.py` file for a matching class definition.
fn resolve_component_file(
    plugin_path: &Path,
    import_path: &str,
    class_name: &str,
) -> Option<PathBuf> {
    if import_path.is_empty() {
        let entry = plugin_path.join(ENTRY_FILE);
        return entry.exists().then_some(entry);
    }

    let module_path = import_path.trim_start_matches('.').replace('.', "/");

    let direct = plugin_path.join(format!("{module_path}.py"));
    if direct.exists() {
        return Some(direct);
    }

    let init = plugin_path.join(&module_path).join("__init__.py");
    if init.exists() {
        return Some(init);
    }

    scan_for_class(plugin_path, class_name)
}

/// Scan the plugin tree for a file textually defining `class_name`.
pub(crate) fn scan_for_class(plugin_path: &Path, class_name: &str) -> Option<PathBuf> {
    let pattern = Regex::new(&format!(r"class\s+{}\s*\(", regex::escape(class_name))).ok()?;

    let mut candidates: Vec<PathBuf> = WalkDir::new(plugin_path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().map(|e| e == "py").unwrap_or(false))
        .filter(|p| p.file_name().map(|n| n != "__init__.py").unwrap_or(true))
        .collect();
    candidates.sort();

    candidates.into_iter().find(|path| {
        std::fs::read_to_string(path)
            .map(|content| pattern.is_match(&content))
            .unwrap_or(false)
    })
}

fn relative_path(plugin_path: &Path, file: &Path) -> String {
    file.strip_prefix(plugin_path)
        .unwrap_or(file)
        .to_string_lossy()
        .replace('\\', "/")
}

fn check_required_attributes(
    class: &ClassDescriptor,
    required: &[&str],
    rel_path: &str,
    result: &mut ValidationResult,
) {
    for attribute in required {
        match class.attribute(attribute) {
            None => result.push(
                Issue::error(
                    IssueKind::MissingAttribute {
                        class: class.name.clone(),
                        attribute: (*attribute).to_string(),
                        file: rel_path.to_string(),
                    },
                    format!(
                        "component {} is missing the required attribute {attribute}",
                        class.name
                    ),
                )
                .with_file(rel_path.to_string())
                .with_line(class.span.start_line)
                .with_suggestion(format!(
                    "add {attribute} = '...' to the class, or run 'plugcheck check --fix'"
                )),
            ),
            Some(attr) if attr.is_empty_value() => result.push(
                Issue::warning(
                    IssueKind::EmptyAttribute {
                        class: class.name.clone(),
                        attribute: (*attribute).to_string(),
                    },
                    format!("component {} has an empty {attribute}", class.name),
                )
                .with_file(rel_path.to_string())
                .with_line(attr.span.start_line),
            ),
            Some(_) => {}
        }
    }
}

fn check_required_methods(
    class: &ClassDescriptor,
    entry: &'static rules::RuleEntry,
    rel_path: &str,
    result: &mut ValidationResult,
) {
    for method_name in entry.required_methods {
        let spec = entry.signature(method_name);
        match class.method(method_name) {
            None => {
                let suggestion = match spec {
                    Some(spec) => format!(
                        "implement:\n    {}:\n        ... | or run 'plugcheck check --fix'",
                        spec.render_signature()
                    ),
                    None => format!(
                        "implement:\n    async def {method_name}(self, ...):\n        ... \
                         | or run 'plugcheck check --fix'"
                    ),
                };
                result.push(
                    Issue::error(
                        IssueKind::MissingMethod {
                            class: class.name.clone(),
                            method: (*method_name).to_string(),
                            is_async: spec.map(|s| s.is_async).unwrap_or(false),
                            file: rel_path.to_string(),
                        },
                        format!(
                            "component {} is missing the required method {method_name}",
                            class.name
                        ),
                    )
                    .with_file(rel_path.to_string())
                    .with_line(class.span.start_line)
                    .with_suggestion(suggestion),
                );
            }
            Some(method) => {
                if method.body_is_stub {
                    result.push(
                        Issue::warning(
                            IssueKind::StubMethod {
                                class: class.name.clone(),
                                method: (*method_name).to_string(),
                            },
                            format!(
                                "{}.{method_name} only contains pass or raise NotImplementedError \
                                 and may not be implemented",
                                class.name
                            ),
                        )
                        .with_file(rel_path.to_string())
                        .with_line(method.span.start_line)
                        .with_suggestion(format!("implement the body of {method_name}")),
                    );
                }
                if let Some(spec) = spec {
                    check_method_signature(class, method, spec, rel_path, result);
                }
            }
        }
    }
}

fn check_method_signature(
    class: &ClassDescriptor,
    method: &MethodDescriptor,
    spec: &'static MethodSpec,
    rel_path: &str,
    result: &mut ValidationResult,
) {
    if spec.is_async && !method.is_async {
        result.push(
            Issue::error(
                IssueKind::WrongAsync {
                    class: class.name.clone(),
                    method: method.name.clone(),
                    should_be_async: true,
                    file: rel_path.to_string(),
                },
                format!("{}.{} must be asynchronous", class.name, method.name),
            )
            .with_file(rel_path.to_string())
            .with_line(method.span.start_line)
            .with_suggestion(format!(
                "change 'def {0}' to 'async def {0}' | or run 'plugcheck check --fix'",
                method.name
            )),
        );
    } else if !spec.is_async && method.is_async {
        result.push(
            Issue::warning(
                IssueKind::WrongAsync {
                    class: class.name.clone(),
                    method: method.name.clone(),
                    should_be_async: false,
                    file: rel_path.to_string(),
                },
                format!("{}.{} should not be asynchronous", class.name, method.name),
            )
            .with_file(rel_path.to_string())
            .with_line(method.span.start_line)
            .with_suggestion(format!(
                "change 'async def {0}' to 'def {0}' | or run 'plugcheck check --fix'",
                method.name
            )),
        );
    }

    if let ParamSpec::Fixed(reqs) = spec.params {
        let actual = method.params_after_receiver();
        let min = reqs.iter().filter(|r| !r.optional).count();
        let max = reqs.len();

        if actual.len() < min {
            let required: Vec<&str> = spec.required_param_names();
            result.push(
                Issue::error(
                    IssueKind::ParamMismatch {
                        class: class.name.clone(),
                        method: method.name.clone(),
                        expected: spec.param_fragments(),
                        file: rel_path.to_string(),
                    },
                    format!(
                        "{}.{} is missing required parameters: {}",
                        class.name,
                        method.name,
                        required.join(", ")
                    ),
                )
                .with_file(rel_path.to_string())
                .with_line(method.span.start_line)
                .with_suggestion(format!(
                    "signature should be: {} | or run 'plugcheck check --fix'",
                    spec.render_signature()
                )),
            );
        } else if actual.len() > max && !method.has_vararg && !method.has_kwarg {
            result.push(
                Issue::warning(
                    IssueKind::ParamMismatch {
                        class: class.name.clone(),
                        method: method.name.clone(),
                        expected: spec.param_fragments(),
                        file: rel_path.to_string(),
                    },
                    format!(
                        "{}.{} takes more parameters than expected",
                        class.name, method.name
                    ),
                )
                .with_file(rel_path.to_string())
                .with_line(method.span.start_line)
                .with_suggestion(format!("expected signature: {}", spec.render_signature())),
            );
        }
    }

    match &method.return_annotation {
        Some(actual) if !annotations_match(actual, spec.return_type) => {
            result.push(
                Issue::warning(
                    IssueKind::ReturnTypeMismatch {
                        class: class.name.clone(),
                        method: method.name.clone(),
                        expected: spec.return_type.to_string(),
                        file: rel_path.to_string(),
                    },
                    format!(
                        "{}.{} return type annotation does not match: expected {}, found {}",
                        class.name, method.name, spec.return_type, actual
                    ),
                )
                .with_file(rel_path.to_string())
                .with_line(method.span.start_line)
                .with_suggestion(format!("change the return annotation to: -> {}", spec.return_type)),
            );
        }
        None => {
            result.push(
                Issue::warning(
                    IssueKind::ReturnTypeMismatch {
                        class: class.name.clone(),
                        method: method.name.clone(),
                        expected: spec.return_type.to_string(),
                        file: rel_path.to_string(),
                    },
                    format!(
                        "{}.{} is missing a return type annotation",
                        class.name, method.name
                    ),
                )
                .with_file(rel_path.to_string())
                .with_line(method.span.start_line)
                .with_suggestion(format!("add: -> {}", spec.return_type)),
            );
        }
        Some(_) => {}
    }
}

/// Relaxed, symmetric comparison of two type annotation strings.
///
/// Matches when (a) equal after whitespace stripping, (b) equivalent after
/// normalizing `Optional[X]` to `X|None`, (c) the outermost generic base
/// names are equal (`tuple` matches `tuple[bool, str]`), or (d) both sides
/// form a union and their bare identifier token sets are equal. Lossy on
/// purpose: failing to flag a real mismatch is preferred over blocking
/// legitimate code.
pub fn annotations_match(left: &str, right: &str) -> bool {
    let a: String = left.chars().filter(|c| !c.is_whitespace()).collect();
    let b: String = right.chars().filter(|c| !c.is_whitespace()).collect();

    if a == b {
        return true;
    }

    if normalize_optional(&a) == normalize_optional(&b) {
        return true;
    }

    let base_a = a.split('[').next().unwrap_or("");
    let base_b = b.split('[').next().unwrap_or("");
    if !base_a.is_empty() && base_a == base_b {
        return true;
    }

    let unionish = |s: &str| s.contains("Union") || s.contains('|');
    if unionish(&a) || unionish(&b) {
        return identifier_tokens(&a) == identifier_tokens(&b);
    }

    false
}

/// Rewrite `Optional[X]` as `X|None`. Input is whitespace-free.
fn normalize_optional(annotation: &str) -> String {
    match annotation
        .strip_prefix("Optional[")
        .and_then(|rest| rest.strip_suffix(']'))
    {
        Some(inner) => format!("{inner}|None"),
        None => annotation.to_string(),
    }
}

/// Bare identifier tokens of an annotation, excluding the union formers.
fn identifier_tokens(annotation: &str) -> HashSet<String> {
    use once_cell::sync::Lazy;
    static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("valid regex"));
    WORD.find_iter(annotation)
        .map(|m| m.as_str().to_string())
        .filter(|t| t != "Union" && t != "Optional")
        .collect()
}
