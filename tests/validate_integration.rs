//! End-to-end validation runs against plugin directories on disk.

use std::fs;
use std::path::Path;

use plugcheck::validate::{self, IssueKind, Level};
use tempfile::TempDir;

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

const GOOD_MANIFEST: &str = r#"{
    "name": "demo",
    "version": "1.0.0",
    "description": "a demo plugin",
    "author": "someone",
    "dependencies": {"plugins": [], "components": []},
    "entry_point": "plugin.py",
    "min_core_version": "1.0.0",
    "include": []
}"#;

/// A complete plugin that passes every validator.
fn well_formed_plugin() -> TempDir {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "manifest.json", GOOD_MANIFEST);
    write(
        temp.path(),
        "plugin.py",
        r#"from .actions.greet import GreetAction
from .config import DemoConfig


class DemoPlugin(BasePlugin):
    plugin_name = "demo"
    configs = [DemoConfig]

    def get_components(self) -> list[type]:
        return [GreetAction]
"#,
    );
    write(
        temp.path(),
        "actions/greet.py",
        r#"class GreetAction(BaseAction):
    action_name = "greet"
    action_description = "greets the user"

    async def execute(self, *args, **kwargs) -> tuple[bool, str]:
        return True, "hello"
"#,
    );
    write(
        temp.path(),
        "config.py",
        r#"class DemoConfig(BaseConfig):
    config_name = "demo"

    class General(SectionBase):
        enabled: bool = True
"#,
    );
    temp
}

#[test]
fn well_formed_plugin_passes_cleanly() {
    let plugin = well_formed_plugin();
    let report = validate::run_all(plugin.path());
    assert!(report.success());
    assert_eq!(report.error_count(), 0, "issues: {:?}",
        report.all_issues().collect::<Vec<_>>());
    assert_eq!(report.warning_count(), 0);
}

#[test]
fn missing_manifest_key_is_one_error() {
    let plugin = well_formed_plugin();
    let manifest = GOOD_MANIFEST.replace("\"author\": \"someone\",\n", "");
    write(plugin.path(), "manifest.json", &manifest);

    let report = validate::run_all(plugin.path());
    assert!(!report.success());
    assert_eq!(report.error_count(), 1);
    let error = report
        .all_issues()
        .find(|i| i.level == Level::Error)
        .unwrap();
    assert!(matches!(
        &error.kind,
        IssueKind::ManifestKeyMissing { key } if key == "author"
    ));
}

#[test]
fn missing_component_attribute_names_only_the_gap() {
    let plugin = well_formed_plugin();
    write(
        plugin.path(),
        "actions/greet.py",
        r#"class GreetAction(BaseAction):
    action_name = "greet"

    async def execute(self, *args, **kwargs) -> tuple[bool, str]:
        return True, "hello"
"#,
    );

    let report = validate::run_all(plugin.path());
    assert_eq!(report.error_count(), 1);
    let error = report
        .all_issues()
        .find(|i| i.level == Level::Error)
        .unwrap();
    assert!(matches!(
        &error.kind,
        IssueKind::MissingAttribute { attribute, .. } if attribute == "action_description"
    ));
    assert!(!report.all_issues().any(|i| i.message.contains("action_name")));
}

#[test]
fn discovery_preserves_append_order() {
    let plugin = well_formed_plugin();
    write(
        plugin.path(),
        "plugin.py",
        r#"from .actions.greet import GreetAction
from .config import DemoConfig


class DemoPlugin(BasePlugin):
    plugin_name = "demo"
    configs = [DemoConfig]

    def get_components(self) -> list[type]:
        components = []
        components.append(Zulu)
        components.append(GreetAction)
        return components


class Zulu(BaseTool):
    tool_name = "zulu"
    tool_description = "last alphabetically, first registered"

    async def execute(self, *args, **kwargs) -> tuple[bool, str | dict]:
        return True, "ok"
"#,
    );

    let unit =
        plugcheck::SourceUnit::from_file(&plugin.path().join("plugin.py")).unwrap();
    let discovery = plugcheck::discover_components(&unit, "demo");
    let names: Vec<&str> = discovery
        .components
        .iter()
        .map(|c| c.class_name.as_str())
        .collect();
    assert_eq!(names, vec!["Zulu", "GreetAction"]);

    let report = validate::run_all(plugin.path());
    assert!(report.success(), "issues: {:?}",
        report.all_issues().collect::<Vec<_>>());
}

#[test]
fn sync_execute_on_async_contract_is_error_with_suggestion() {
    let plugin = well_formed_plugin();
    write(
        plugin.path(),
        "actions/greet.py",
        r#"class GreetAction(BaseAction):
    action_name = "greet"
    action_description = "greets the user"

    def execute(self, *args, **kwargs) -> tuple[bool, str]:
        return True, "hello"
"#,
    );

    let report = validate::run_all(plugin.path());
    assert_eq!(report.error_count(), 1);
    let error = report
        .all_issues()
        .find(|i| i.level == Level::Error)
        .unwrap();
    assert!(matches!(
        &error.kind,
        IssueKind::WrongAsync { should_be_async: true, .. }
    ));
    assert!(error
        .suggestion
        .as_deref()
        .unwrap()
        .contains("async def execute"));
}

#[test]
fn unknown_base_class_fails_the_run() {
    let plugin = well_formed_plugin();
    write(
        plugin.path(),
        "actions/greet.py",
        "class GreetAction(BaseWidget):\n    pass\n",
    );

    let report = validate::run_all(plugin.path());
    assert!(!report.success());
    assert!(report.all_issues().any(|i| matches!(
        &i.kind,
        IssueKind::UnknownBaseClass { base, .. } if base == "BaseWidget"
    )));
}

#[test]
fn syntax_error_in_one_component_does_not_hide_the_rest() {
    let plugin = well_formed_plugin();
    write(plugin.path(), "actions/greet.py", "class GreetAction(\n");

    let report = validate::run_all(plugin.path());
    assert!(!report.success());
    assert!(report
        .all_issues()
        .any(|i| matches!(&i.kind, IssueKind::ParseFailure { file } if file == "actions/greet.py")));
    // manifest and config checks still ran
    assert_eq!(report.results.len(), 3);
    assert!(report.results[0].success(), "metadata pass unaffected");
    assert!(report.results[2].success(), "config pass unaffected");
}

#[test]
fn warnings_do_not_fail_the_run() {
    let plugin = well_formed_plugin();
    // drop the configs declaration: NoConfigs is a warning
    write(
        plugin.path(),
        "plugin.py",
        r#"from .actions.greet import GreetAction


class DemoPlugin(BasePlugin):
    plugin_name = "demo"

    def get_components(self) -> list[type]:
        return [GreetAction]
"#,
    );

    let report = validate::run_all(plugin.path());
    assert!(report.success());
    assert!(report.warning_count() >= 1);
}

#[test]
fn json_report_round_trips_issue_kinds() {
    let plugin = well_formed_plugin();
    write(
        plugin.path(),
        "actions/greet.py",
        r#"class GreetAction(BaseAction):
    action_name = "greet"

    async def execute(self, *args, **kwargs) -> tuple[bool, str]:
        return True, "hello"
"#,
    );
    let report = validate::run_all(plugin.path());
    let json = serde_json::to_value(&report.results).unwrap();
    let issue = json[1]["issues"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["kind"] == "missing_attribute")
        .unwrap();
    assert_eq!(issue["attribute"], "action_description");
    assert_eq!(issue["level"], "error");
}
