//! Static component discovery from the plugin's registration method.
//!
//! Enumerates the components returned by `get_components()` without
//! executing any code. Three return shapes are understood:
//!
//! - a literal list: `return [MyAction, MyTool]`
//! - a variable first assigned a literal list, later returned by name
//! - a variable grown via `.append(...)` calls, then returned by name
//!
//! Anything else (computed expressions, conditional returns) yields an
//! empty result flagged as unsupported, which the component validator
//! reports as a warning so the remaining checks still run.

use tree_sitter::Node;

use crate::parse::SourceUnit;
use crate::rules::REGISTRATION_METHOD;

/// A discovered component registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDeclaration {
    /// The component class name as written in the registration body.
    pub class_name: String,
    /// Relative module path the class is imported from (leading dots
    /// preserved); empty when the class is co-located with the entry file.
    pub import_path: String,
}

/// Outcome of a discovery pass.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Declarations in first-seen source order; duplicates are preserved.
    pub components: Vec<ComponentDeclaration>,
    /// The registration method returned something discovery cannot
    /// evaluate statically.
    pub unsupported_return: bool,
}

/// Statically evaluate the registration method of the entry file.
///
/// `plugin_name` is the plugin's package name, used to rewrite absolute
/// imports of the plugin's own modules into their relative form. Imports
/// of unrelated packages are ignored.
pub fn discover_components(unit: &SourceUnit, plugin_name: &str) -> Discovery {
    let imports = plugin_local_imports(unit, plugin_name);

    let Some(func) = find_registration_method(unit) else {
        return Discovery::default();
    };
    let Some(body) = func.child_by_field_name("body") else {
        return Discovery::default();
    };

    // First pass: literal list assignments and append-shaped calls.
    let mut assigned_lists: Vec<(String, Vec<String>)> = Vec::new();
    let mut appends: Vec<(String, String)> = Vec::new();

    let mut walker = body.walk();
    for stmt in body.named_children(&mut walker) {
        if stmt.kind() != "expression_statement" {
            continue;
        }
        let Some(expr) = stmt.named_child(0) else {
            continue;
        };
        match expr.kind() {
            "assignment" => {
                let (Some(left), Some(right)) = (
                    expr.child_by_field_name("left"),
                    expr.child_by_field_name("right"),
                ) else {
                    continue;
                };
                if left.kind() == "identifier" && right.kind() == "list" {
                    assigned_lists.push((
                        unit.node_text(left).to_string(),
                        list_identifiers(unit, right),
                    ));
                }
            }
            "call" => {
                if let Some((var, appended)) = append_call(unit, expr) {
                    appends.push((var, appended));
                }
            }
            _ => {}
        }
    }

    // Second pass: the first return statement decides the result.
    let mut walker = body.walk();
    for stmt in body.named_children(&mut walker) {
        if stmt.kind() != "return_statement" {
            continue;
        }
        let Some(value) = stmt.named_child(0) else {
            // bare `return` registers nothing
            return Discovery::default();
        };

        let names = match value.kind() {
            "list" => list_identifiers(unit, value),
            "identifier" => {
                let var = unit.node_text(value);
                let mut names: Vec<String> = assigned_lists
                    .iter()
                    .find(|(name, _)| name == var)
                    .map(|(_, elements)| elements.clone())
                    .unwrap_or_default();
                names.extend(
                    appends
                        .iter()
                        .filter(|(name, _)| name == var)
                        .map(|(_, class)| class.clone()),
                );
                names
            }
            _ => {
                return Discovery {
                    components: Vec::new(),
                    unsupported_return: true,
                }
            }
        };

        let components = names
            .into_iter()
            .map(|class_name| {
                let import_path = imports
                    .iter()
                    .find(|(name, _)| *name == class_name)
                    .map(|(_, path)| path.clone())
                    .unwrap_or_default();
                ComponentDeclaration {
                    class_name,
                    import_path,
                }
            })
            .collect();

        return Discovery {
            components,
            unsupported_return: false,
        };
    }

    Discovery::default()
}

/// Imports that resolve inside the plugin package, as
/// `(imported name, relative module path)` pairs.
///
/// Relative imports keep their dot count; absolute imports of the plugin's
/// own package are rewritten to the equivalent relative form; absolute
/// imports of unrelated packages are dropped.
fn plugin_local_imports(unit: &SourceUnit, plugin_name: &str) -> Vec<(String, String)> {
    let mut local = Vec::new();
    for (name, module) in unit.imported_names() {
        if module.starts_with('.') {
            local.push((name, module));
        } else if module == plugin_name {
            local.push((name, ".".to_string()));
        } else if let Some(rest) = module.strip_prefix(plugin_name) {
            if let Some(rest) = rest.strip_prefix('.') {
                local.push((name, format!(".{rest}")));
            }
        }
    }
    local.sort();
    local
}

/// Find the registration method's definition node anywhere in the file.
fn find_registration_method<'a>(unit: &'a SourceUnit) -> Option<Node<'a>> {
    let mut stack = vec![unit.root()];
    let mut found: Option<Node> = None;
    while let Some(node) = stack.pop() {
        if node.kind() == "function_definition" {
            if let Some(name) = node.child_by_field_name("name") {
                if unit.node_text(name) == REGISTRATION_METHOD {
                    match found {
                        Some(existing) if existing.start_byte() <= node.start_byte() => {}
                        _ => found = Some(node),
                    }
                }
            }
        }
        for i in (0..node.named_child_count()).rev() {
            if let Some(child) = node.named_child(i) {
                stack.push(child);
            }
        }
    }
    found
}

/// Identifier elements of a list literal, in source order.
fn list_identifiers(unit: &SourceUnit, list_node: Node) -> Vec<String> {
    let mut names = Vec::new();
    let mut walker = list_node.walk();
    for element in list_node.named_children(&mut walker) {
        if element.kind() == "identifier" {
            names.push(unit.node_text(element).to_string());
        }
    }
    names
}

/// Match `var.append(SomeClass)` and return `(var, SomeClass)`.
fn append_call(unit: &SourceUnit, call: Node) -> Option<(String, String)> {
    let func = call.child_by_field_name("function")?;
    if func.kind() != "attribute" {
        return None;
    }
    let attr = func.child_by_field_name("attribute")?;
    if unit.node_text(attr) != "append" {
        return None;
    }
    let object = func.child_by_field_name("object")?;
    if object.kind() != "identifier" {
        return None;
    }
    let args = call.child_by_field_name("arguments")?;
    let mut walker = args.walk();
    let first = args.named_children(&mut walker).next()?;
    if first.kind() != "identifier" {
        return None;
    }
    Some((
        unit.node_text(object).to_string(),
        unit.node_text(first).to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn parse(source: &str) -> SourceUnit {
        SourceUnit::from_source(Path::new("plugin.py"), source.to_string()).unwrap()
    }

    #[test]
    fn test_direct_list_return() {
        let unit = parse(
            r#"
from .actions.my_action import MyAction
from .tools.my_tool import MyTool

class MyPlugin(BasePlugin):
    plugin_name = "demo"

    def get_components(self) -> list[type]:
        return [MyAction, MyTool]
"#,
        );
        let discovery = discover_components(&unit, "demo");
        assert!(!discovery.unsupported_return);
        let names: Vec<&str> = discovery
            .components
            .iter()
            .map(|c| c.class_name.as_str())
            .collect();
        assert_eq!(names, vec!["MyAction", "MyTool"]);
        assert_eq!(discovery.components[0].import_path, ".actions.my_action");
    }

    #[test]
    fn test_append_sequence_preserves_order() {
        let unit = parse(
            r#"
class MyPlugin(BasePlugin):
    def get_components(self):
        components = []
        components.append(Foo)
        components.append(Bar)
        return components
"#,
        );
        let discovery = discover_components(&unit, "demo");
        let names: Vec<&str> = discovery
            .components
            .iter()
            .map(|c| c.class_name.as_str())
            .collect();
        assert_eq!(names, vec!["Foo", "Bar"]);
    }

    #[test]
    fn test_assigned_list_plus_appends() {
        let unit = parse(
            r#"
class MyPlugin(BasePlugin):
    def get_components(self):
        components = [First]
        components.append(Second)
        return components
"#,
        );
        let discovery = discover_components(&unit, "demo");
        let names: Vec<&str> = discovery
            .components
            .iter()
            .map(|c| c.class_name.as_str())
            .collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn test_unsupported_return_shape() {
        let unit = parse(
            r#"
class MyPlugin(BasePlugin):
    def get_components(self):
        return build_components()
"#,
        );
        let discovery = discover_components(&unit, "demo");
        assert!(discovery.unsupported_return);
        assert!(discovery.components.is_empty());
    }

    #[test]
    fn test_duplicates_are_not_deduplicated() {
        let unit = parse(
            r#"
class MyPlugin(BasePlugin):
    def get_components(self):
        return [Foo, Foo]
"#,
        );
        let discovery = discover_components(&unit, "demo");
        assert_eq!(discovery.components.len(), 2);
    }

    #[test]
    fn test_absolute_self_import_rewritten_relative() {
        let unit = parse(
            r#"
from demo.tools import MyTool

class MyPlugin(BasePlugin):
    def get_components(self):
        return [MyTool]
"#,
        );
        let discovery = discover_components(&unit, "demo");
        assert_eq!(discovery.components[0].import_path, ".tools");
    }

    #[test]
    fn test_unrelated_absolute_import_ignored() {
        let unit = parse(
            r#"
from totally_external import Widget

class MyPlugin(BasePlugin):
    def get_components(self):
        return [Widget]
"#,
        );
        let discovery = discover_components(&unit, "demo");
        // discovered, but with no plugin-local import path
        assert_eq!(discovery.components[0].import_path, "");
    }

    #[test]
    fn test_co_located_component_has_empty_path() {
        let unit = parse(
            r#"
class Inline(BaseAction):
    action_name = "inline"

class MyPlugin(BasePlugin):
    def get_components(self):
        return [Inline]
"#,
        );
        let discovery = discover_components(&unit, "demo");
        assert_eq!(discovery.components[0].import_path, "");
    }
}
