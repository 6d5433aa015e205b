use once_cell::sync::OnceCell;
use tree_sitter::{Node, Query};

use super::{child_text_of_kind, LanguageGrammar};

pub struct RustGrammar;

// Static query caches for Rust
static RUST_IMPORTS_QUERY: OnceCell<Query> = OnceCell::new();
static RUST_EXPORTS_QUERY: OnceCell<Query> = OnceCell::new();
static RUST_FUNCTIONS_QUERY: OnceCell<Query> = OnceCell::new();

impl LanguageGrammar for RustGrammar {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["rs"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn imports_query(&self) -> &str {
        r#"
        (use_declaration
            argument: (_) @source
        )

        (extern_crate_declaration
            name: (identifier) @source
        )
        "#
    }

    fn exports_query(&self) -> &str {
        r#"
        (function_item
            (visibility_modifier)
            name: (identifier) @name
        ) @function

        (struct_item
            (visibility_modifier)
            name: (type_identifier) @name
        ) @struct

        (enum_item
            (visibility_modifier)
            name: (type_identifier) @name
        ) @enum

        (trait_item
            (visibility_modifier)
            name: (type_identifier) @name
        ) @trait

        (type_item
            (visibility_modifier)
            name: (type_identifier) @name
        ) @type_alias

        (const_item
            (visibility_modifier)
            name: (identifier) @name
        ) @constant

        (static_item
            (visibility_modifier)
            name: (identifier) @name
        ) @constant

        (mod_item
            (visibility_modifier)
            name: (identifier) @name
        ) @module
        "#
    }

    fn functions_query(&self) -> &str {
        r#"
        (function_item
            name: (identifier) @name
        ) @function

        (function_signature_item
            name: (identifier) @name
        ) @function
        "#
    }

    /// Only plain `pub` items at module level count; `pub(crate)` and
    /// associated functions stay internal.
    fn is_exported(&self, _name: &str, decl: Node, source: &[u8]) -> bool {
        if child_text_of_kind(decl, "visibility_modifier", source) != Some("pub") {
            return false;
        }
        match decl.parent() {
            None => true,
            Some(parent) if parent.kind() == "source_file" => true,
            Some(parent) => {
                parent.kind() == "declaration_list"
                    && parent.parent().map(|p| p.kind() == "mod_item").unwrap_or(false)
            }
        }
    }

    fn is_method(&self, decl: Node) -> bool {
        decl.parent()
            .filter(|p| p.kind() == "declaration_list")
            .and_then(|p| p.parent())
            .map(|owner| matches!(owner.kind(), "impl_item" | "trait_item"))
            .unwrap_or(false)
    }

    fn cached_imports_query(&self) -> Option<&'static Query> {
        RUST_IMPORTS_QUERY.get_or_try_init(|| {
            Query::new(&self.language(), self.imports_query())
        }).ok()
    }

    fn cached_exports_query(&self) -> Option<&'static Query> {
        RUST_EXPORTS_QUERY.get_or_try_init(|| {
            Query::new(&self.language(), self.exports_query())
        }).ok()
    }

    fn cached_functions_query(&self) -> Option<&'static Query> {
        RUST_FUNCTIONS_QUERY.get_or_try_init(|| {
            Query::new(&self.language(), self.functions_query())
        }).ok()
    }
}
