use once_cell::sync::OnceCell;
use tree_sitter::{Node, Query};

use super::{child_text_of_kind, LanguageGrammar};

pub struct JavaGrammar;

static JAVA_IMPORTS_QUERY: OnceCell<Query> = OnceCell::new();
static JAVA_EXPORTS_QUERY: OnceCell<Query> = OnceCell::new();
static JAVA_FUNCTIONS_QUERY: OnceCell<Query> = OnceCell::new();

impl LanguageGrammar for JavaGrammar {
    fn name(&self) -> &'static str {
        "java"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["java"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_java::LANGUAGE.into()
    }

    fn imports_query(&self) -> &str {
        r#"
        (import_declaration
            (scoped_identifier) @source
        )

        (import_declaration
            (identifier) @source
        )
        "#
    }

    fn exports_query(&self) -> &str {
        r#"
        (class_declaration
            name: (identifier) @name
        ) @class

        (interface_declaration
            name: (identifier) @name
        ) @interface

        (enum_declaration
            name: (identifier) @name
        ) @enum

        (record_declaration
            name: (identifier) @name
        ) @record
        "#
    }

    fn functions_query(&self) -> &str {
        r#"
        (method_declaration
            name: (identifier) @name
        ) @method

        (constructor_declaration
            name: (identifier) @name
        ) @method
        "#
    }

    fn is_exported(&self, _name: &str, decl: Node, source: &[u8]) -> bool {
        child_text_of_kind(decl, "modifiers", source)
            .map(|mods| mods.split_whitespace().any(|m| m == "public"))
            .unwrap_or(false)
    }

    fn cached_imports_query(&self) -> Option<&'static Query> {
        JAVA_IMPORTS_QUERY.get_or_try_init(|| {
            Query::new(&self.language(), self.imports_query())
        }).ok()
    }

    fn cached_exports_query(&self) -> Option<&'static Query> {
        JAVA_EXPORTS_QUERY.get_or_try_init(|| {
            Query::new(&self.language(), self.exports_query())
        }).ok()
    }

    fn cached_functions_query(&self) -> Option<&'static Query> {
        JAVA_FUNCTIONS_QUERY.get_or_try_init(|| {
            Query::new(&self.language(), self.functions_query())
        }).ok()
    }
}
