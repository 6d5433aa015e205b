use once_cell::sync::OnceCell;
use tree_sitter::{Node, Query};

use super::LanguageGrammar;

pub struct GoGrammar;

static GO_IMPORTS_QUERY: OnceCell<Query> = OnceCell::new();
static GO_EXPORTS_QUERY: OnceCell<Query> = OnceCell::new();
static GO_FUNCTIONS_QUERY: OnceCell<Query> = OnceCell::new();

impl LanguageGrammar for GoGrammar {
    fn name(&self) -> &'static str {
        "go"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["go"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_go::LANGUAGE.into()
    }

    fn imports_query(&self) -> &str {
        r#"
        (import_spec
            path: (interpreted_string_literal) @source
        )
        "#
    }

    fn exports_query(&self) -> &str {
        r#"
        (function_declaration
            name: (identifier) @name
        ) @function

        (method_declaration
            name: (field_identifier) @name
        ) @function

        (type_spec
            name: (type_identifier) @name
            type: (struct_type)
        ) @struct

        (type_spec
            name: (type_identifier) @name
            type: (interface_type)
        ) @interface

        (type_spec
            name: (type_identifier) @name
            type: (_) @_target
            (#not-match? @_target "^(struct|interface)\\b")
        ) @type

        (const_spec
            name: (identifier) @name
        ) @constant

        (var_spec
            name: (identifier) @name
        ) @variable
        "#
    }

    fn functions_query(&self) -> &str {
        r#"
        (function_declaration
            name: (identifier) @name
        ) @function

        (method_declaration
            name: (field_identifier) @name
        ) @method
        "#
    }

    fn is_exported(&self, name: &str, _decl: Node, _source: &[u8]) -> bool {
        name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
    }

    fn cached_imports_query(&self) -> Option<&'static Query> {
        GO_IMPORTS_QUERY.get_or_try_init(|| {
            Query::new(&self.language(), self.imports_query())
        }).ok()
    }

    fn cached_exports_query(&self) -> Option<&'static Query> {
        GO_EXPORTS_QUERY.get_or_try_init(|| {
            Query::new(&self.language(), self.exports_query())
        }).ok()
    }

    fn cached_functions_query(&self) -> Option<&'static Query> {
        GO_FUNCTIONS_QUERY.get_or_try_init(|| {
            Query::new(&self.language(), self.functions_query())
        }).ok()
    }
}
