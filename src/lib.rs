//! Plugcheck - static structure validator for plugin projects.
//!
//! Plugcheck checks a plugin directory against the host framework's
//! structural contract without importing or executing any plugin code.
//! All analysis is derived from tree-sitter parses of the plugin's Python
//! sources and from the raw manifest JSON, and fixable findings can be
//! repaired in place without disturbing the surrounding formatting.
//!
//! # Architecture
//!
//! - `parse`: tree-sitter parse façade over one source file
//! - `discover`: static evaluation of the component registration method
//! - `rules`: declarative rule tables keyed by component base class
//! - `manifest`: plugin manifest model
//! - `validate`: the metadata, component, and config validation passes
//! - `fix`: byte-range auto-fix engine driven by structured issue kinds
//! - `report`: output formatting (pretty, JSON)
//!
//! # Adding a New Component Kind
//!
//! Add a `RuleEntry` and its aliases to the table in `src/rules.rs`; the
//! component validator and fix engine pick it up from there.

pub mod cli;
pub mod discover;
pub mod fix;
pub mod manifest;
pub mod parse;
pub mod report;
pub mod rules;
pub mod validate;

pub use discover::{discover_components, ComponentDeclaration, Discovery};
pub use fix::{apply_fixes, FixOutcome};
pub use manifest::Manifest;
pub use parse::{ClassDescriptor, MethodDescriptor, ParseError, SourceUnit};
pub use rules::{lookup, RuleEntry};
pub use validate::{run_all, Issue, IssueKind, Level, RunReport, ValidationResult};
