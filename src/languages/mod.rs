pub mod go;
pub mod java;
pub mod python;
pub mod rust;
pub mod typescript;

use std::sync::Arc;

use tree_sitter::{Node, Query};

/// Static description of one tree-sitter language: grammar plus the queries
/// used to pull facts out of its syntax tree.
///
/// Query capture conventions:
/// - imports: `@source` on the module path node
/// - functions: `@name` plus one of `@function`, `@method`, `@arrow` on the declaration
/// - exports: `@name` (optional) plus a kind capture understood by
///   [`crate::facts::ExportKind::from_capture`] on the declaration
pub trait LanguageGrammar: Send + Sync {
    fn name(&self) -> &'static str;
    fn file_extensions(&self) -> &[&'static str];
    fn language(&self) -> tree_sitter::Language;
    fn imports_query(&self) -> &str;
    fn exports_query(&self) -> &str;
    fn functions_query(&self) -> &str;

    /// Extra filter applied to every export match (naming conventions,
    /// visibility modifiers). `decl` is the node under the kind capture.
    fn is_exported(&self, _name: &str, _decl: Node, _source: &[u8]) -> bool {
        true
    }

    /// Whether a `@function` declaration is really a method of an enclosing
    /// type.
    fn is_method(&self, _decl: Node) -> bool {
        false
    }

    /// Get cached imports query (compiled once)
    fn cached_imports_query(&self) -> Option<&'static Query> {
        None
    }

    /// Get cached exports query (compiled once)
    fn cached_exports_query(&self) -> Option<&'static Query> {
        None
    }

    /// Get cached functions query (compiled once)
    fn cached_functions_query(&self) -> Option<&'static Query> {
        None
    }
}

/// Every grammar shipped with the crate, in registration order.
pub fn default_grammars() -> Vec<Arc<dyn LanguageGrammar>> {
    vec![
        Arc::new(typescript::TypeScriptGrammar),
        Arc::new(typescript::TsxGrammar),
        Arc::new(rust::RustGrammar),
        Arc::new(python::PythonGrammar),
        Arc::new(go::GoGrammar),
        Arc::new(java::JavaGrammar),
    ]
}

/// Text of the first direct child of `node` with the given kind.
pub(crate) fn child_text_of_kind<'a>(node: Node, kind: &str, source: &'a [u8]) -> Option<&'a str> {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .find(|child| child.kind() == kind)
        .and_then(|child| child.utf8_text(source).ok());
    found
}
