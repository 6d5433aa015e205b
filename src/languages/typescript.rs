use once_cell::sync::OnceCell;
use tree_sitter::Query;

use super::LanguageGrammar;

/// TypeScript without JSX.
pub struct TypeScriptGrammar;

/// TSX, JSX and plain JavaScript, which may carry JSX; same queries,
/// different grammar.
pub struct TsxGrammar;

static TS_IMPORTS_QUERY: OnceCell<Query> = OnceCell::new();
static TS_EXPORTS_QUERY: OnceCell<Query> = OnceCell::new();
static TS_FUNCTIONS_QUERY: OnceCell<Query> = OnceCell::new();

static TSX_IMPORTS_QUERY: OnceCell<Query> = OnceCell::new();
static TSX_EXPORTS_QUERY: OnceCell<Query> = OnceCell::new();
static TSX_FUNCTIONS_QUERY: OnceCell<Query> = OnceCell::new();

const IMPORTS_QUERY: &str = r#"
    (import_statement
        source: (string) @source
    )

    (export_statement
        source: (string) @source
    )

    (call_expression
        function: (identifier) @_require
        arguments: (arguments (string) @source)
        (#eq? @_require "require")
    )
"#;

const EXPORTS_QUERY: &str = r#"
    (export_statement
        declaration: (function_declaration
            name: (identifier) @name
        )
    ) @function

    (export_statement
        declaration: (generator_function_declaration
            name: (identifier) @name
        )
    ) @function

    (export_statement
        declaration: (class_declaration
            name: (type_identifier) @name
        )
    ) @class

    (export_statement
        declaration: (abstract_class_declaration
            name: (type_identifier) @name
        )
    ) @class

    (export_statement
        declaration: (interface_declaration
            name: (type_identifier) @name
        )
    ) @interface

    (export_statement
        declaration: (type_alias_declaration
            name: (type_identifier) @name
        )
    ) @type

    (export_statement
        declaration: (enum_declaration
            name: (identifier) @name
        )
    ) @enum

    (export_statement
        declaration: (lexical_declaration
            (variable_declarator
                name: (identifier) @name
            )
        )
    ) @variable

    (export_statement
        declaration: (variable_declaration
            (variable_declarator
                name: (identifier) @name
            )
        )
    ) @variable

    (export_statement
        (export_clause
            (export_specifier
                name: (identifier) @name
            )
        )
    ) @variable

    (export_statement
        value: (_)
    ) @default
"#;

const FUNCTIONS_QUERY: &str = r#"
    (function_declaration
        name: (identifier) @name
    ) @function

    (generator_function_declaration
        name: (identifier) @name
    ) @function

    (method_definition
        name: (property_identifier) @name
    ) @method

    (variable_declarator
        name: (identifier) @name
        value: (arrow_function)
    ) @arrow

    (variable_declarator
        name: (identifier) @name
        value: (function_expression)
    ) @function
"#;

impl LanguageGrammar for TypeScriptGrammar {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["ts", "mts", "cts"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
    }

    fn imports_query(&self) -> &str {
        IMPORTS_QUERY
    }

    fn exports_query(&self) -> &str {
        EXPORTS_QUERY
    }

    fn functions_query(&self) -> &str {
        FUNCTIONS_QUERY
    }

    fn cached_imports_query(&self) -> Option<&'static Query> {
        TS_IMPORTS_QUERY.get_or_try_init(|| {
            Query::new(&self.language(), self.imports_query())
        }).ok()
    }

    fn cached_exports_query(&self) -> Option<&'static Query> {
        TS_EXPORTS_QUERY.get_or_try_init(|| {
            Query::new(&self.language(), self.exports_query())
        }).ok()
    }

    fn cached_functions_query(&self) -> Option<&'static Query> {
        TS_FUNCTIONS_QUERY.get_or_try_init(|| {
            Query::new(&self.language(), self.functions_query())
        }).ok()
    }
}

impl LanguageGrammar for TsxGrammar {
    fn name(&self) -> &'static str {
        "tsx"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["tsx", "jsx", "js", "mjs", "cjs"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_typescript::LANGUAGE_TSX.into()
    }

    fn imports_query(&self) -> &str {
        IMPORTS_QUERY
    }

    fn exports_query(&self) -> &str {
        EXPORTS_QUERY
    }

    fn functions_query(&self) -> &str {
        FUNCTIONS_QUERY
    }

    fn cached_imports_query(&self) -> Option<&'static Query> {
        TSX_IMPORTS_QUERY.get_or_try_init(|| {
            Query::new(&self.language(), self.imports_query())
        }).ok()
    }

    fn cached_exports_query(&self) -> Option<&'static Query> {
        TSX_EXPORTS_QUERY.get_or_try_init(|| {
            Query::new(&self.language(), self.exports_query())
        }).ok()
    }

    fn cached_functions_query(&self) -> Option<&'static Query> {
        TSX_FUNCTIONS_QUERY.get_or_try_init(|| {
            Query::new(&self.language(), self.functions_query())
        }).ok()
    }
}
