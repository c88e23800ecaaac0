//! Plugin manifest model.
//!
//! The metadata validator checks manifests leniently against raw JSON
//! values so one malformed field cannot hide the rest; the typed model
//! here is used when the fix engine needs to create a fresh minimal
//! manifest.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Keys every manifest must carry.
pub const REQUIRED_KEYS: &[&str] = &[
    "name",
    "version",
    "description",
    "author",
    "dependencies",
    "entry_point",
];

/// Keys a manifest should carry.
pub const RECOMMENDED_KEYS: &[&str] = &["min_core_version", "include"];

/// Declared plugin/component dependencies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dependencies {
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(default)]
    pub components: Vec<String>,
}

/// One entry of the optional `include` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludeEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

/// A plugin manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub dependencies: Dependencies,
    pub entry_point: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_core_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<IncludeEntry>>,
}

impl Manifest {
    /// Build a minimal valid manifest for a plugin directory, with the
    /// name taken from the directory and placeholder values elsewhere.
    pub fn minimal(plugin_dir: &Path) -> Self {
        let name = plugin_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "plugin".to_string());
        Self {
            name,
            version: "0.1.0".to_string(),
            description: "TODO: describe this plugin".to_string(),
            author: String::new(),
            dependencies: Dependencies::default(),
            entry_point: crate::rules::ENTRY_FILE.to_string(),
            min_core_version: None,
            include: None,
        }
    }

    /// Serialize as pretty JSON with a trailing newline.
    pub fn to_json(&self) -> anyhow::Result<String> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_manifest_has_required_keys() {
        let manifest = Manifest::minimal(Path::new("/plugins/demo_plugin"));
        assert_eq!(manifest.name, "demo_plugin");
        assert_eq!(manifest.version, "0.1.0");
        assert_eq!(manifest.entry_point, "plugin.py");

        let value: serde_json::Value =
            serde_json::from_str(&manifest.to_json().unwrap()).unwrap();
        for key in REQUIRED_KEYS {
            assert!(value.get(key).is_some(), "missing required key {key}");
        }
    }
}
