use once_cell::sync::OnceCell;
use tree_sitter::{Node, Query};

use super::LanguageGrammar;

pub struct PythonGrammar;

static PYTHON_IMPORTS_QUERY: OnceCell<Query> = OnceCell::new();
static PYTHON_EXPORTS_QUERY: OnceCell<Query> = OnceCell::new();
static PYTHON_FUNCTIONS_QUERY: OnceCell<Query> = OnceCell::new();

impl LanguageGrammar for PythonGrammar {
    fn name(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["py", "pyi"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn imports_query(&self) -> &str {
        r#"
        (import_statement
            name: (dotted_name) @source
        )

        (import_statement
            name: (aliased_import
                name: (dotted_name) @source
            )
        )

        (import_from_statement
            module_name: (dotted_name) @source
        )

        (import_from_statement
            module_name: (relative_import) @source
        )
        "#
    }

    // Module-level definitions only; nested defs are not importable.
    fn exports_query(&self) -> &str {
        r#"
        (module
            (function_definition
                name: (identifier) @name
            ) @function
        )

        (module
            (decorated_definition
                definition: (function_definition
                    name: (identifier) @name
                )
            ) @function
        )

        (module
            (class_definition
                name: (identifier) @name
            ) @class
        )

        (module
            (decorated_definition
                definition: (class_definition
                    name: (identifier) @name
                )
            ) @class
        )

        (module
            (expression_statement
                (assignment
                    left: (identifier) @name
                )
            ) @variable
        )
        "#
    }

    fn functions_query(&self) -> &str {
        r#"
        (function_definition
            name: (identifier) @name
        ) @function
        "#
    }

    fn is_exported(&self, name: &str, _decl: Node, _source: &[u8]) -> bool {
        !name.starts_with('_')
    }

    fn is_method(&self, decl: Node) -> bool {
        let mut current = decl.parent();
        while let Some(node) = current {
            match node.kind() {
                "decorated_definition" | "block" => current = node.parent(),
                "class_definition" => return true,
                _ => return false,
            }
            if current.map(|n| n.kind() == "function_definition").unwrap_or(false) {
                return false;
            }
        }
        false
    }

    fn cached_imports_query(&self) -> Option<&'static Query> {
        PYTHON_IMPORTS_QUERY.get_or_try_init(|| {
            Query::new(&self.language(), self.imports_query())
        }).ok()
    }

    fn cached_exports_query(&self) -> Option<&'static Query> {
        PYTHON_EXPORTS_QUERY.get_or_try_init(|| {
            Query::new(&self.language(), self.exports_query())
        }).ok()
    }

    fn cached_functions_query(&self) -> Option<&'static Query> {
        PYTHON_FUNCTIONS_QUERY.get_or_try_init(|| {
            Query::new(&self.language(), self.functions_query())
        }).ok()
    }
}
