//! Manifest validation pass.
//!
//! Checks `manifest.json` for the required and recommended key set and
//! the expected field shapes. A JSON decode failure is a single error and
//! short-circuits the remaining manifest checks (there is no data left to
//! check); it does not stop the component or config validators.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::manifest::{RECOMMENDED_KEYS, REQUIRED_KEYS};
use crate::rules::MANIFEST_FILE;

use super::{plugin_identity, Issue, IssueKind, ValidationResult};

static SEMVER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+\.\d+").expect("valid regex"));

/// Validate the plugin manifest.
pub fn validate(plugin_path: &Path) -> ValidationResult {
    let mut result = ValidationResult::new("metadata");

    if plugin_identity(plugin_path).is_none() {
        result.push(Issue::error(
            IssueKind::PluginIdentityUnknown,
            "cannot determine plugin identity",
        ));
        return result;
    }

    let manifest_path = plugin_path.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        result.push(
            Issue::error(IssueKind::ManifestMissing, "manifest.json not found")
                .with_suggestion("run 'plugcheck check --fix' to create a minimal manifest"),
        );
        return result;
    }

    let content = match fs::read_to_string(&manifest_path) {
        Ok(c) => c,
        Err(e) => {
            result.push(
                Issue::error(
                    IssueKind::ManifestInvalidJson,
                    format!("failed to read manifest.json: {e}"),
                )
                .with_file(MANIFEST_FILE),
            );
            return result;
        }
    };

    let value: Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            result.push(
                Issue::error(
                    IssueKind::ManifestInvalidJson,
                    format!("manifest.json is not valid JSON: {e}"),
                )
                .with_file(MANIFEST_FILE)
                .with_line(e.line()),
            );
            return result;
        }
    };

    let Some(object) = value.as_object() else {
        result.push(
            Issue::error(
                IssueKind::ManifestInvalidJson,
                "manifest.json must contain a JSON object",
            )
            .with_file(MANIFEST_FILE),
        );
        return result;
    };

    for key in REQUIRED_KEYS {
        if !object.contains_key(*key) {
            result.push(
                Issue::error(
                    IssueKind::ManifestKeyMissing {
                        key: (*key).to_string(),
                    },
                    format!("manifest is missing required key: {key}"),
                )
                .with_file(MANIFEST_FILE)
                .with_suggestion(format!("add \"{key}\" to manifest.json")),
            );
        }
    }

    check_dependencies(object, &mut result);
    check_include(object, &mut result);
    check_version(object, &mut result);
    check_entry_point(plugin_path, object, &mut result);

    for key in RECOMMENDED_KEYS {
        if !object.contains_key(*key) {
            result.push(
                Issue::warning(
                    IssueKind::ManifestKeyRecommended {
                        key: (*key).to_string(),
                    },
                    format!("manifest is missing recommended key: {key}"),
                )
                .with_file(MANIFEST_FILE),
            );
        }
    }

    result
}

fn check_dependencies(object: &serde_json::Map<String, Value>, result: &mut ValidationResult) {
    let Some(deps) = object.get("dependencies") else {
        return;
    };
    let Some(deps) = deps.as_object() else {
        result.push(
            Issue::error(
                IssueKind::ManifestFieldShape {
                    field: "dependencies".to_string(),
                },
                "dependencies must be an object",
            )
            .with_file(MANIFEST_FILE),
        );
        return;
    };
    for sub in ["plugins", "components"] {
        if let Some(list) = deps.get(sub) {
            if !list.is_array() {
                result.push(
                    Issue::error(
                        IssueKind::ManifestFieldShape {
                            field: format!("dependencies.{sub}"),
                        },
                        format!("dependencies.{sub} must be an array"),
                    )
                    .with_file(MANIFEST_FILE),
                );
            }
        }
    }
}

fn check_include(object: &serde_json::Map<String, Value>, result: &mut ValidationResult) {
    let Some(include) = object.get("include") else {
        return;
    };
    let Some(entries) = include.as_array() else {
        result.push(
            Issue::error(
                IssueKind::ManifestFieldShape {
                    field: "include".to_string(),
                },
                "include must be an array",
            )
            .with_file(MANIFEST_FILE),
        );
        return;
    };
    for (index, entry) in entries.iter().enumerate() {
        let Some(entry) = entry.as_object() else {
            result.push(
                Issue::error(
                    IssueKind::ManifestFieldShape {
                        field: format!("include[{index}]"),
                    },
                    format!("include[{index}] must be an object"),
                )
                .with_file(MANIFEST_FILE),
            );
            continue;
        };
        for key in ["component_type", "component_name"] {
            if !entry.contains_key(key) {
                result.push(
                    Issue::warning(
                        IssueKind::ManifestFieldShape {
                            field: format!("include[{index}].{key}"),
                        },
                        format!("include[{index}] should carry {key}"),
                    )
                    .with_file(MANIFEST_FILE),
                );
            }
        }
    }
}

fn check_version(object: &serde_json::Map<String, Value>, result: &mut ValidationResult) {
    let Some(value) = object.get("version") else {
        return;
    };
    let Some(version) = value.as_str() else {
        result.push(
            Issue::warning(
                IssueKind::ManifestFieldShape {
                    field: "version".to_string(),
                },
                "version must be a string",
            )
            .with_file(MANIFEST_FILE)
            .with_suggestion("quote the version, e.g. \"0.1.0\""),
        );
        return;
    };
    if !SEMVER_PREFIX.is_match(version) {
        result.push(
            Issue::warning(
                IssueKind::ManifestVersionFormat {
                    version: version.to_string(),
                },
                format!("version {version:?} does not look semantic-version-like"),
            )
            .with_file(MANIFEST_FILE)
            .with_suggestion("use a major.minor.patch version, e.g. \"0.1.0\""),
        );
    }
}

fn check_entry_point(
    plugin_path: &Path,
    object: &serde_json::Map<String, Value>,
    result: &mut ValidationResult,
) {
    let Some(entry_point) = object.get("entry_point").and_then(|v| v.as_str()) else {
        return;
    };
    if !plugin_path.join(entry_point).exists() {
        result.push(
            Issue::warning(
                IssueKind::ManifestEntryPointMissing {
                    entry_point: entry_point.to_string(),
                },
                format!("entry_point {entry_point:?} does not resolve to an existing file"),
            )
            .with_file(MANIFEST_FILE),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::Level;
    use tempfile::TempDir;

    fn plugin_with_manifest(manifest: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("manifest.json"), manifest).unwrap();
        fs::write(
            temp.path().join("plugin.py"),
            "class P(BasePlugin):\n    plugin_name = \"demo\"\n",
        )
        .unwrap();
        temp
    }

    const COMPLETE: &str = r#"{
        "name": "demo",
        "version": "1.2.3",
        "description": "a demo",
        "author": "someone",
        "dependencies": {"plugins": [], "components": []},
        "entry_point": "plugin.py",
        "min_core_version": "1.0.0",
        "include": []
    }"#;

    #[test]
    fn test_complete_manifest_passes() {
        let temp = plugin_with_manifest(COMPLETE);
        let result = validate(temp.path());
        assert!(result.success(), "unexpected issues: {:?}", result.issues);
        assert_eq!(result.issues.len(), 0);
    }

    #[test]
    fn test_missing_author_is_single_error() {
        let manifest = r#"{
            "name": "demo",
            "version": "1.2.3",
            "description": "a demo",
            "dependencies": {},
            "entry_point": "plugin.py",
            "min_core_version": "1.0.0",
            "include": []
        }"#;
        let temp = plugin_with_manifest(manifest);
        let result = validate(temp.path());

        assert!(!result.success());
        let errors: Vec<_> = result.errors().collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("author"));
    }

    #[test]
    fn test_invalid_json_short_circuits() {
        let temp = plugin_with_manifest("{ not json");
        let result = validate(temp.path());
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].kind, IssueKind::ManifestInvalidJson);
        assert!(result.issues[0].line_number.is_some());
    }

    #[test]
    fn test_missing_manifest() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("plugin.py"), "x = 1\n").unwrap();
        let result = validate(temp.path());
        assert_eq!(result.issues[0].kind, IssueKind::ManifestMissing);
    }

    #[test]
    fn test_dependency_shape_errors() {
        let manifest = r#"{
            "name": "demo",
            "version": "1.2.3",
            "description": "a demo",
            "author": "someone",
            "dependencies": {"plugins": "not-a-list"},
            "entry_point": "plugin.py",
            "min_core_version": "1.0.0",
            "include": []
        }"#;
        let temp = plugin_with_manifest(manifest);
        let result = validate(temp.path());
        assert!(result.issues.iter().any(|i| matches!(
            &i.kind,
            IssueKind::ManifestFieldShape { field } if field == "dependencies.plugins"
        )));
    }

    #[test]
    fn test_odd_version_and_missing_entry_point_warn() {
        let manifest = r#"{
            "name": "demo",
            "version": "latest",
            "description": "a demo",
            "author": "someone",
            "dependencies": {},
            "entry_point": "nope.py",
            "min_core_version": "1.0.0",
            "include": []
        }"#;
        let temp = plugin_with_manifest(manifest);
        let result = validate(temp.path());
        assert!(result.success(), "shape issues here are warnings only");
        assert!(result
            .issues
            .iter()
            .any(|i| matches!(i.kind, IssueKind::ManifestVersionFormat { .. })));
        assert!(result
            .issues
            .iter()
            .any(|i| matches!(i.kind, IssueKind::ManifestEntryPointMissing { .. })));
        assert!(result.issues.iter().all(|i| i.level == Level::Warning));
    }

    #[test]
    fn test_non_string_version_warns() {
        let manifest = r#"{
            "name": "demo",
            "version": 1,
            "description": "a demo",
            "author": "someone",
            "dependencies": {},
            "entry_point": "plugin.py",
            "min_core_version": "1.0.0",
            "include": []
        }"#;
        let temp = plugin_with_manifest(manifest);
        let result = validate(temp.path());
        assert!(result.success());
        let shapes: Vec<_> = result
            .issues
            .iter()
            .filter(|i| matches!(&i.kind, IssueKind::ManifestFieldShape { field } if field == "version"))
            .collect();
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].level, Level::Warning);
    }

    #[test]
    fn test_nonexistent_directory_is_identity_error() {
        let result = validate(Path::new("/does/not/exist"));
        assert_eq!(result.issues[0].kind, IssueKind::PluginIdentityUnknown);
    }
}
