//! Structural facts extracted from parsed plugin sources.

use std::fmt;

/// Source location span with byte offsets and line/column positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Start byte offset (0-indexed).
    pub start_byte: usize,
    /// End byte offset (0-indexed, exclusive).
    pub end_byte: usize,
    /// Start line (1-indexed).
    pub start_line: usize,
    /// Start column (1-indexed).
    pub start_col: usize,
    /// End line (1-indexed).
    pub end_line: usize,
    /// End column (1-indexed).
    pub end_col: usize,
}

impl Span {
    /// Create a span from a tree-sitter node.
    pub fn from_node(node: tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: start.row + 1, // tree-sitter is 0-indexed
            start_col: start.column + 1,
            end_line: end.row + 1,
            end_col: end.column + 1,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_col)
    }
}

/// A class-level attribute assignment (`name = value` or `name: T = value`).
#[derive(Debug, Clone)]
pub struct ClassAttr {
    /// The attribute name.
    pub name: String,
    /// The literal value, when it is one the validator understands:
    /// string literals verbatim (unquoted), `"[...]"` for lists, `"{...}"`
    /// for dicts. `None` for everything else (calls, names, bare
    /// annotations without a value).
    pub value: Option<String>,
    /// Whether the assignment carried a type annotation.
    pub annotated: bool,
    /// For list-literal values: the identifier elements as written
    /// (`configs = [FooConfig, BarConfig]` yields `["FooConfig",
    /// "BarConfig"]`). Read from the literal syntax, never evaluated.
    pub list_names: Vec<String>,
    /// Span of the assignment statement.
    pub span: Span,
}

impl ClassAttr {
    /// Whether the attribute holds a known-falsy value (empty string,
    /// empty list/dict markers are still considered present).
    pub fn is_empty_value(&self) -> bool {
        matches!(self.value.as_deref(), Some("") | None)
    }
}

/// One parameter of a method signature.
#[derive(Debug, Clone)]
pub struct Param {
    /// Parameter name.
    pub name: String,
    /// Annotation text as written in source, if any.
    pub annotation: Option<String>,
    /// Whether the parameter has a default value.
    pub has_default: bool,
}

/// A method discovered on a class.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    /// Method name.
    pub name: String,
    /// Whether the method is declared `async def`.
    pub is_async: bool,
    /// Ordered parameters, including the receiver (`self`).
    pub params: Vec<Param>,
    /// Whether the signature carries `*args`.
    pub has_vararg: bool,
    /// Whether the signature carries `**kwargs`.
    pub has_kwarg: bool,
    /// Return annotation text as written, if any.
    pub return_annotation: Option<String>,
    /// True iff the body consists only of a docstring, `pass`, and/or a
    /// bare `raise NotImplementedError`.
    pub body_is_stub: bool,
    /// Span of the whole definition.
    pub span: Span,
}

impl MethodDescriptor {
    /// Parameters excluding the receiver.
    pub fn params_after_receiver(&self) -> &[Param] {
        if self.params.first().map(|p| p.name == "self").unwrap_or(false) {
            &self.params[1..]
        } else {
            &self.params[..]
        }
    }
}

/// A class discovered in a source unit.
///
/// Only the first declared base is consulted (`base_class_name`); this
/// mirrors the host framework's single-base contract and is a known
/// limitation for multiple-inheritance components.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    /// Class name.
    pub name: String,
    /// Literal name token of the first declared base; empty if the class
    /// declares no bases. For `module.Base` forms, the trailing attribute.
    pub base_class_name: String,
    /// Class-level attributes in source order.
    pub attributes: Vec<ClassAttr>,
    /// Methods in source order.
    pub methods: Vec<MethodDescriptor>,
    /// Directly nested class definitions (one level), used for config
    /// section checks.
    pub nested: Vec<ClassDescriptor>,
    /// Span of the class definition.
    pub span: Span,
}

impl ClassDescriptor {
    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&ClassAttr> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Look up a method by name.
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }
}
