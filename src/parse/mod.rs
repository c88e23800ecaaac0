//! Source parse façade for plugin Python files.
//!
//! Wraps a single tree-sitter parse of one file behind pure, side-effect
//! free queries: find classes by base or name, read class attributes,
//! collect imports, extract method signatures. The tree-sitter tree is a
//! full-fidelity concrete syntax tree (every source byte is covered by a
//! node span), so the same parse backs both the semantic queries here and
//! the byte-range rewrites in the fix engine.

mod facts;

pub use facts::{ClassAttr, ClassDescriptor, MethodDescriptor, Param, Span};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, Tree};

/// Tree-sitter query matching every class definition, decorated or not.
const CLASS_QUERY: &str = r#"
(class_definition
  name: (identifier) @class_name
) @class
"#;

/// Tree-sitter query matching `from ... import ...` statements.
const IMPORT_QUERY: &str = r#"
(import_from_statement) @import_from
"#;

/// Errors surfaced by the parse façade.
///
/// A syntax error is a distinguishable condition (not an empty result) and
/// carries the file path plus the first offending position.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("syntax error in {path} at {line}:{col}")]
    Syntax {
        path: PathBuf,
        line: usize,
        col: usize,
    },
    #[error("parser failure on {path}")]
    Parser { path: PathBuf },
}

impl ParseError {
    /// Line number of the error, when known.
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::Syntax { line, .. } => Some(*line),
            _ => None,
        }
    }
}

fn python_language() -> Language {
    tree_sitter_python::LANGUAGE.into()
}

/// One parsed source file: the tree, the original text, and the path.
///
/// Immutable once parsed; queries never mutate the tree. Two parses of the
/// same unchanged file yield identical query results.
#[derive(Debug)]
pub struct SourceUnit {
    tree: Tree,
    source: String,
    path: PathBuf,
}

impl SourceUnit {
    /// Parse a file from disk.
    pub fn from_file(path: &Path) -> Result<Self, ParseError> {
        let source = fs::read_to_string(path).map_err(|e| ParseError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_source(path, source)
    }

    /// Parse already-loaded source text.
    pub fn from_source(path: &Path, source: String) -> Result<Self, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&python_language())
            .map_err(|_| ParseError::Parser {
                path: path.to_path_buf(),
            })?;
        let tree = parser
            .parse(source.as_bytes(), None)
            .ok_or_else(|| ParseError::Parser {
                path: path.to_path_buf(),
            })?;

        if tree.root_node().has_error() {
            let (line, col) = first_error_position(tree.root_node());
            return Err(ParseError::Syntax {
                path: path.to_path_buf(),
                line,
                col,
            });
        }

        Ok(Self {
            tree,
            source,
            path: path.to_path_buf(),
        })
    }

    /// The original source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Path this unit was parsed from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Root node of the parse tree.
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Text for a node of this unit's tree.
    pub fn node_text(&self, node: Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// All class definitions in the file, in source order. Nested classes
    /// are included both inline (under `nested`) and as standalone entries,
    /// matching a whole-tree walk.
    pub fn classes(&self) -> Vec<ClassDescriptor> {
        let query = match Query::new(&python_language(), CLASS_QUERY) {
            Ok(q) => q,
            Err(_) => return Vec::new(),
        };
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, self.root(), self.source.as_bytes());

        let mut nodes = Vec::new();
        while let Some(m) = matches.next() {
            for capture in m.captures {
                if query.capture_names()[capture.index as usize] == "class" {
                    nodes.push(capture.node);
                }
            }
        }
        nodes.sort_by_key(|n| n.start_byte());

        nodes
            .into_iter()
            .map(|n| self.class_descriptor(n))
            .collect()
    }

    /// Find classes filtered by first-base name and/or class name.
    pub fn find_classes(&self, base: Option<&str>, name: Option<&str>) -> Vec<ClassDescriptor> {
        self.classes()
            .into_iter()
            .filter(|c| base.map(|b| c.base_class_name == b).unwrap_or(true))
            .filter(|c| name.map(|n| c.name == n).unwrap_or(true))
            .collect()
    }

    /// Value of one attribute on the first class deriving `base`.
    pub fn class_attribute(&self, base: &str, attribute: &str) -> Option<String> {
        self.find_classes(Some(base), None)
            .into_iter()
            .next()
            .and_then(|c| c.attribute(attribute).and_then(|a| a.value.clone()))
    }

    /// All attributes of the first class deriving `base`, in source order.
    pub fn all_class_attributes(&self, base: &str) -> Vec<ClassAttr> {
        self.find_classes(Some(base), None)
            .into_iter()
            .next()
            .map(|c| c.attributes)
            .unwrap_or_default()
    }

    /// Map of imported name to module path for every `from ... import`
    /// statement. Relative imports keep their leading dots; aliased imports
    /// are keyed by the original name.
    pub fn imported_names(&self) -> HashMap<String, String> {
        let mut imports = HashMap::new();
        let query = match Query::new(&python_language(), IMPORT_QUERY) {
            Ok(q) => q,
            Err(_) => return imports,
        };
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, self.root(), self.source.as_bytes());

        while let Some(m) = matches.next() {
            for capture in m.captures {
                let stmt = capture.node;
                let module = match stmt.child_by_field_name("module_name") {
                    Some(n) => self.node_text(n).to_string(),
                    None => continue,
                };
                let mut walker = stmt.walk();
                for name_node in stmt.children_by_field_name("name", &mut walker) {
                    let imported = match name_node.kind() {
                        "dotted_name" => self.node_text(name_node).to_string(),
                        "aliased_import" => name_node
                            .child_by_field_name("name")
                            .map(|n| self.node_text(n).to_string())
                            .unwrap_or_default(),
                        _ => continue,
                    };
                    if !imported.is_empty() {
                        imports.insert(imported, module.clone());
                    }
                }
            }
        }

        imports
    }

    /// Module-level assignments to `name`, returning each right-hand-side
    /// text in source order.
    pub fn find_assignments(&self, name: &str) -> Vec<String> {
        let mut values = Vec::new();
        let root = self.root();
        let mut walker = root.walk();
        for stmt in root.named_children(&mut walker) {
            if stmt.kind() != "expression_statement" {
                continue;
            }
            let Some(assign) = stmt.named_child(0).filter(|n| n.kind() == "assignment") else {
                continue;
            };
            let Some(left) = assign.child_by_field_name("left") else {
                continue;
            };
            if left.kind() == "identifier" && self.node_text(left) == name {
                if let Some(right) = assign.child_by_field_name("right") {
                    values.push(self.node_text(right).to_string());
                }
            }
        }
        values
    }

    /// Definition node of a class, for byte-accurate rewrites. Returns the
    /// first definition in source order.
    pub fn class_node(&self, class_name: &str) -> Option<Node<'_>> {
        let mut stack = vec![self.root()];
        let mut found: Option<Node> = None;
        while let Some(node) = stack.pop() {
            if node.kind() == "class_definition" {
                if let Some(name) = node.child_by_field_name("name") {
                    if self.node_text(name) == class_name {
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

    /// Definition node of a method directly on a class body, unwrapping
    /// decorated definitions.
    pub fn method_node(&self, class_name: &str, method_name: &str) -> Option<Node<'_>> {
        let class = self.class_node(class_name)?;
        let body = class.child_by_field_name("body")?;
        let mut walker = body.walk();
        for stmt in body.named_children(&mut walker) {
            let def = match stmt.kind() {
                "function_definition" => stmt,
                "decorated_definition" => match stmt.child_by_field_name("definition") {
                    Some(d) if d.kind() == "function_definition" => d,
                    _ => continue,
                },
                _ => continue,
            };
            if let Some(name) = def.child_by_field_name("name") {
                if self.node_text(name) == method_name {
                    return Some(def);
                }
            }
        }
        None
    }

    /// Build a descriptor for one class definition node.
    fn class_descriptor(&self, class_node: Node) -> ClassDescriptor {
        let name = class_node
            .child_by_field_name("name")
            .map(|n| self.node_text(n).to_string())
            .unwrap_or_default();
        let base_class_name = self.first_base_name(class_node);

        let mut attributes = Vec::new();
        let mut methods = Vec::new();
        let mut nested = Vec::new();

        if let Some(body) = class_node.child_by_field_name("body") {
            let mut walker = body.walk();
            for stmt in body.named_children(&mut walker) {
                match stmt.kind() {
                    "expression_statement" => {
                        if let Some(attr) = self.attribute_from_statement(stmt) {
                            attributes.push(attr);
                        }
                    }
                    "function_definition" => methods.push(self.method_descriptor(stmt)),
                    "class_definition" => nested.push(self.class_descriptor(stmt)),
                    "decorated_definition" => {
                        if let Some(def) = stmt.child_by_field_name("definition") {
                            match def.kind() {
                                "function_definition" => {
                                    methods.push(self.method_descriptor(def))
                                }
                                "class_definition" => nested.push(self.class_descriptor(def)),
                                _ => {}
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        ClassDescriptor {
            name,
            base_class_name,
            attributes,
            methods,
            nested,
            span: Span::from_node(class_node),
        }
    }

    /// Literal name token of the first declared base, or empty string.
    fn first_base_name(&self, class_node: Node) -> String {
        let Some(supers) = class_node.child_by_field_name("superclasses") else {
            return String::new();
        };
        let mut walker = supers.walk();
        let Some(first) = supers.named_children(&mut walker).next() else {
            return String::new();
        };
        match first.kind() {
            "identifier" => self.node_text(first).to_string(),
            // module.Base forms: take the trailing attribute token
            "attribute" => first
                .child_by_field_name("attribute")
                .map(|n| self.node_text(n).to_string())
                .unwrap_or_default(),
            _ => String::new(),
        }
    }

    /// Extract a class attribute from an `expression_statement`, if it is
    /// a plain or annotated assignment to a single name.
    fn attribute_from_statement(&self, stmt: Node) -> Option<ClassAttr> {
        let assign = stmt.named_child(0).filter(|n| n.kind() == "assignment")?;
        let left = assign.child_by_field_name("left")?;
        if left.kind() != "identifier" {
            return None;
        }
        let annotated = assign.child_by_field_name("type").is_some();
        let right = assign.child_by_field_name("right");
        let value = right.and_then(|r| self.literal_value(r));
        let list_names = right
            .filter(|r| r.kind() == "list")
            .map(|r| self.list_identifier_names(r))
            .unwrap_or_default();

        Some(ClassAttr {
            name: self.node_text(left).to_string(),
            value,
            annotated,
            list_names,
            span: Span::from_node(stmt),
        })
    }

    /// Convert a literal value node to its validator-visible string form.
    ///
    /// Strings yield their content, lists and dicts yield shape markers,
    /// falsy constants and non-literals yield `None` so the caller treats
    /// the attribute as present-but-empty.
    fn literal_value(&self, node: Node) -> Option<String> {
        match node.kind() {
            "string" => {
                let mut content = String::new();
                let mut walker = node.walk();
                for part in node.children(&mut walker) {
                    if part.kind() == "string_content" {
                        content.push_str(self.node_text(part));
                    }
                }
                Some(content)
            }
            "list" => Some("[...]".to_string()),
            "dictionary" => Some("{...}".to_string()),
            "true" => Some("True".to_string()),
            "integer" | "float" => {
                let text = self.node_text(node);
                if text == "0" {
                    None
                } else {
                    Some(text.to_string())
                }
            }
            "none" | "false" => None,
            _ => None,
        }
    }

    /// Identifier elements of a list literal, in source order.
    fn list_identifier_names(&self, list_node: Node) -> Vec<String> {
        let mut names = Vec::new();
        let mut walker = list_node.walk();
        for element in list_node.named_children(&mut walker) {
            if element.kind() == "identifier" {
                names.push(self.node_text(element).to_string());
            }
        }
        names
    }

    /// Build a descriptor for one function definition node.
    fn method_descriptor(&self, func_node: Node) -> MethodDescriptor {
        let name = func_node
            .child_by_field_name("name")
            .map(|n| self.node_text(n).to_string())
            .unwrap_or_default();

        let mut is_async = false;
        let mut walker = func_node.walk();
        for child in func_node.children(&mut walker) {
            if child.kind() == "async" {
                is_async = true;
                break;
            }
        }

        let mut params = Vec::new();
        let mut has_vararg = false;
        let mut has_kwarg = false;
        if let Some(parameters) = func_node.child_by_field_name("parameters") {
            let mut walker = parameters.walk();
            for param in parameters.named_children(&mut walker) {
                match param.kind() {
                    "identifier" => params.push(Param {
                        name: self.node_text(param).to_string(),
                        annotation: None,
                        has_default: false,
                    }),
                    "typed_parameter" => {
                        let Some(inner) = param.named_child(0) else {
                            continue;
                        };
                        match inner.kind() {
                            "identifier" => params.push(Param {
                                name: self.node_text(inner).to_string(),
                                annotation: param
                                    .child_by_field_name("type")
                                    .map(|t| self.node_text(t).to_string()),
                                has_default: false,
                            }),
                            "list_splat_pattern" => has_vararg = true,
                            "dictionary_splat_pattern" => has_kwarg = true,
                            _ => {}
                        }
                    }
                    "default_parameter" | "typed_default_parameter" => {
                        if let Some(name_node) = param.child_by_field_name("name") {
                            params.push(Param {
                                name: self.node_text(name_node).to_string(),
                                annotation: param
                                    .child_by_field_name("type")
                                    .map(|t| self.node_text(t).to_string()),
                                has_default: true,
                            });
                        }
                    }
                    "list_splat_pattern" => has_vararg = true,
                    "dictionary_splat_pattern" => has_kwarg = true,
                    _ => {}
                }
            }
        }

        let return_annotation = func_node
            .child_by_field_name("return_type")
            .map(|n| self.node_text(n).to_string());

        let body_is_stub = func_node
            .child_by_field_name("body")
            .map(|b| self.body_is_stub(b))
            .unwrap_or(false);

        MethodDescriptor {
            name,
            is_async,
            params,
            has_vararg,
            has_kwarg,
            return_annotation,
            body_is_stub,
            span: Span::from_node(func_node),
        }
    }

    /// True iff the body contains only docstrings, `...`, `pass`, and/or
    /// `raise NotImplementedError`.
    fn body_is_stub(&self, body: Node) -> bool {
        let mut walker = body.walk();
        for stmt in body.named_children(&mut walker) {
            match stmt.kind() {
                "comment" | "pass_statement" => {}
                "expression_statement" => {
                    let filler = stmt
                        .named_child(0)
                        .map(|n| matches!(n.kind(), "string" | "ellipsis"))
                        .unwrap_or(false);
                    if !filler {
                        return false;
                    }
                }
                "raise_statement" => {
                    if !self.raises_not_implemented(stmt) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        true
    }

    fn raises_not_implemented(&self, raise_stmt: Node) -> bool {
        let Some(exc) = raise_stmt.named_child(0) else {
            // bare `raise`
            return false;
        };
        match exc.kind() {
            "identifier" => self.node_text(exc) == "NotImplementedError",
            "call" => exc
                .child_by_field_name("function")
                .map(|f| f.kind() == "identifier" && self.node_text(f) == "NotImplementedError")
                .unwrap_or(false),
            _ => false,
        }
    }
}

/// Position of the first error or missing node in the tree.
fn first_error_position(root: Node) -> (usize, usize) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let pos = node.start_position();
            return (pos.row + 1, pos.column + 1);
        }
        for i in (0..node.child_count()).rev() {
            if let Some(child) = node.child(i) {
                if child.has_error() {
                    stack.push(child);
                }
            }
        }
    }
    let pos = root.start_position();
    (pos.row + 1, pos.column + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> SourceUnit {
        SourceUnit::from_source(Path::new("test.py"), source.to_string()).unwrap()
    }

    #[test]
    fn test_find_classes_by_base() {
        let unit = parse(
            r#"
class MyPlugin(BasePlugin):
    plugin_name = "demo"

class Helper:
    pass
"#,
        );
        let found = unit.find_classes(Some("BasePlugin"), None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "MyPlugin");
        assert_eq!(unit.find_classes(None, Some("Helper")).len(), 1);
    }

    #[test]
    fn test_dotted_base_uses_trailing_token() {
        let unit = parse("class A(framework.BaseAction):\n    pass\n");
        let classes = unit.classes();
        assert_eq!(classes[0].base_class_name, "BaseAction");
    }

    #[test]
    fn test_class_attributes() {
        let unit = parse(
            r#"
class MyPlugin(BasePlugin):
    plugin_name = "demo"
    empty_field = ""
    configs = [FooConfig, BarConfig]
    extra: int = 3
"#,
        );
        let attrs = unit.all_class_attributes("BasePlugin");
        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs[0].value.as_deref(), Some("demo"));
        assert!(attrs[1].is_empty_value());
        assert_eq!(attrs[2].value.as_deref(), Some("[...]"));
        assert_eq!(attrs[2].list_names, vec!["FooConfig", "BarConfig"]);
        assert!(attrs[3].annotated);
    }

    #[test]
    fn test_imported_names() {
        let unit = parse(
            r#"
from .actions.my_action import MyAction
from ..shared import Util
from demo_plugin.tools import MyTool
from external_lib import Thing as Alias
"#,
        );
        let imports = unit.imported_names();
        assert_eq!(imports["MyAction"], ".actions.my_action");
        assert_eq!(imports["Util"], "..shared");
        assert_eq!(imports["MyTool"], "demo_plugin.tools");
        // aliased imports are keyed by the original name
        assert_eq!(imports["Thing"], "external_lib");
    }

    #[test]
    fn test_method_descriptor() {
        let unit = parse(
            r#"
class MyAction(BaseAction):
    async def execute(self, *args, **kwargs) -> tuple[bool, str]:
        return True, "ok"

    def helper(self, count: int = 0):
        """Doc."""
        raise NotImplementedError
"#,
        );
        let class = unit.classes().into_iter().next().unwrap();
        let execute = class.method("execute").unwrap();
        assert!(execute.is_async);
        assert!(execute.has_vararg);
        assert!(execute.has_kwarg);
        assert_eq!(execute.return_annotation.as_deref(), Some("tuple[bool, str]"));
        assert!(!execute.body_is_stub);

        let helper = class.method("helper").unwrap();
        assert!(!helper.is_async);
        assert!(helper.body_is_stub);
        assert_eq!(helper.params_after_receiver().len(), 1);
        assert_eq!(helper.params_after_receiver()[0].annotation.as_deref(), Some("int"));
        assert!(helper.params_after_receiver()[0].has_default);
    }

    #[test]
    fn test_syntax_error_is_distinguishable() {
        let err = SourceUnit::from_source(Path::new("bad.py"), "def broken(:\n".to_string())
            .unwrap_err();
        match err {
            ParseError::Syntax { path, line, .. } => {
                assert_eq!(path, Path::new("bad.py"));
                assert!(line >= 1);
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_find_assignments() {
        let unit = parse("__plugin_meta__ = PluginMetadata(name=\"x\")\nother = 1\n");
        let values = unit.find_assignments("__plugin_meta__");
        assert_eq!(values.len(), 1);
        assert!(values[0].starts_with("PluginMetadata"));
    }

    #[test]
    fn test_queries_are_deterministic() {
        let source = r#"
class A(BaseAction):
    action_name = "a"

class B(BaseTool):
    tool_name = "b"
"#;
        let first: Vec<String> = parse(source).classes().into_iter().map(|c| c.name).collect();
        let second: Vec<String> = parse(source).classes().into_iter().map(|c| c.name).collect();
        assert_eq!(first, vec!["A", "B"]);
        assert_eq!(first, second);
    }
}
