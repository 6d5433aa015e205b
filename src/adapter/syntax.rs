use std::sync::Arc;

use tree_sitter::{Node, Parser, Query, QueryCursor, StreamingIterator, Tree};

use super::{IncrementalInput, LanguageAdapter, Parsed};
use crate::error::{AnalyzerError, Result};
use crate::facts::{ExportFact, ExportKind, FunctionFact, FunctionKind, ImportFact, ParseResult};
use crate::languages::LanguageGrammar;

/// [`LanguageAdapter`] backed by a tree-sitter grammar.
///
/// Both entry points hand the resulting tree to the same extraction routine,
/// so an incremental parse yields exactly the facts a full parse would.
pub struct TreeSitterAdapter {
    grammar: Arc<dyn LanguageGrammar>,
}

#[derive(Clone, Copy)]
enum FactQuery {
    Imports,
    Exports,
    Functions,
}

impl FactQuery {
    fn as_str(&self) -> &'static str {
        match self {
            FactQuery::Imports => "imports",
            FactQuery::Exports => "exports",
            FactQuery::Functions => "functions",
        }
    }
}

impl TreeSitterAdapter {
    pub fn new(grammar: Arc<dyn LanguageGrammar>) -> Self {
        Self { grammar }
    }

    fn parse_tree(&self, content: &str, file_path: &str, old_tree: Option<&Tree>) -> Result<Tree> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.grammar.language())
            .map_err(|e| AnalyzerError::Parse(e.to_string()))?;

        parser
            .parse(content, old_tree)
            .ok_or_else(|| AnalyzerError::Parse(format!("Failed to parse {}", file_path)))
    }

    /// Runs all three fact queries over `tree`.
    pub fn extract(&self, tree: &Tree, source: &str) -> ParseResult {
        let root = tree.root_node();
        let bytes = source.as_bytes();

        let mut result = ParseResult {
            imports: self.extract_imports(root, bytes),
            exports: self.extract_exports(root, bytes),
            functions: self.extract_functions(root, bytes),
        };
        result.normalize();
        result
    }

    fn extract_imports(&self, root: Node, source: &[u8]) -> Vec<ImportFact> {
        let mut imports = Vec::new();
        self.for_each_match(FactQuery::Imports, root, source, |captures| {
            for (capture_name, node) in captures {
                if *capture_name != "source" {
                    continue;
                }
                let text = node_text(*node, source).trim_matches(|c| c == '"' || c == '\'' || c == '`');
                if !text.is_empty() {
                    imports.push(ImportFact {
                        source: text.to_string(),
                        line: line_of(*node),
                    });
                }
            }
        });
        imports
    }

    fn extract_exports(&self, root: Node, source: &[u8]) -> Vec<ExportFact> {
        let mut exports = Vec::new();
        self.for_each_match(FactQuery::Exports, root, source, |captures| {
            let mut name: Option<&str> = None;
            let mut decl: Option<(ExportKind, Node)> = None;

            for (capture_name, node) in captures {
                if *capture_name == "name" {
                    name = Some(node_text(*node, source));
                } else if let Some(kind) = ExportKind::from_capture(capture_name) {
                    decl = Some((kind, *node));
                }
            }

            let Some((kind, node)) = decl else {
                return;
            };
            let name = match (name, kind) {
                (Some(name), _) => name,
                (None, ExportKind::Default) => "default",
                (None, _) => return,
            };

            if self.grammar.is_exported(name, node, source) {
                exports.push(ExportFact {
                    name: name.to_string(),
                    kind,
                    line: line_of(node),
                });
            }
        });
        exports
    }

    fn extract_functions(&self, root: Node, source: &[u8]) -> Vec<FunctionFact> {
        let mut functions = Vec::new();
        self.for_each_match(FactQuery::Functions, root, source, |captures| {
            let mut name: Option<&str> = None;
            let mut decl: Option<(FunctionKind, Node)> = None;

            for (capture_name, node) in captures {
                match *capture_name {
                    "name" => name = Some(node_text(*node, source)),
                    "function" => {
                        let kind = if self.grammar.is_method(*node) {
                            FunctionKind::Method
                        } else {
                            FunctionKind::Function
                        };
                        decl = Some((kind, *node));
                    }
                    "method" => decl = Some((FunctionKind::Method, *node)),
                    "arrow" => decl = Some((FunctionKind::Arrow, *node)),
                    _ => {}
                }
            }

            if let (Some(name), Some((kind, node))) = (name, decl) {
                functions.push(FunctionFact {
                    name: name.to_string(),
                    kind,
                    line: line_of(node),
                });
            }
        });
        functions
    }

    /// Calls `on_match` with the `(capture name, node)` pairs of every match.
    /// A query that fails to compile is logged and contributes nothing.
    fn for_each_match<'t, F>(&self, which: FactQuery, root: Node<'t>, source: &[u8], mut on_match: F)
    where
        F: FnMut(&[(&str, Node<'t>)]),
    {
        let (cached, query_str) = match which {
            FactQuery::Imports => (self.grammar.cached_imports_query(), self.grammar.imports_query()),
            FactQuery::Exports => (self.grammar.cached_exports_query(), self.grammar.exports_query()),
            FactQuery::Functions => {
                (self.grammar.cached_functions_query(), self.grammar.functions_query())
            }
        };

        let compiled;
        let query: &Query = match cached {
            Some(query) => query,
            None => {
                if query_str.trim().is_empty() {
                    return;
                }
                match Query::new(&self.grammar.language(), query_str) {
                    Ok(query) => {
                        compiled = query;
                        &compiled
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Invalid {} query for {}: {}",
                            which.as_str(),
                            self.grammar.name(),
                            e
                        );
                        return;
                    }
                }
            }
        };

        let capture_names = query.capture_names();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, root, source);
        let mut captures: Vec<(&str, Node<'t>)> = Vec::new();

        while let Some(m) = matches.next() {
            captures.clear();
            captures.extend(
                m.captures
                    .iter()
                    .map(|c| (capture_names[c.index as usize], c.node)),
            );
            on_match(&captures);
        }
    }
}

impl LanguageAdapter for TreeSitterAdapter {
    type Tree = Tree;

    fn name(&self) -> &'static str {
        self.grammar.name()
    }

    fn file_extensions(&self) -> &[&'static str] {
        self.grammar.file_extensions()
    }

    fn parse_file(&self, content: &str, file_path: &str) -> Result<Parsed<Tree>> {
        let tree = self.parse_tree(content, file_path, None)?;
        let result = self.extract(&tree, content);
        Ok(Parsed::new(result, Some(tree)))
    }

    fn parse_incremental(
        &self,
        content: &str,
        file_path: &str,
        input: IncrementalInput<'_, Tree>,
    ) -> Result<Parsed<Tree>> {
        let Some(mut previous) = input.previous_tree else {
            return self.parse_file(content, file_path);
        };

        previous.edit(&input.edit.into());
        let tree = self.parse_tree(content, file_path, Some(&previous))?;
        let result = self.extract(&tree, content);
        Ok(Parsed::new(result, Some(tree)))
    }
}

fn node_text<'s>(node: Node, source: &'s [u8]) -> &'s str {
    node.utf8_text(source).unwrap_or("")
}

fn line_of(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::LanguageRouter;
    use crate::incremental::{calculate_edit, find_minimal_edit};

    fn parse(path: &str, source: &str) -> ParseResult {
        let router = LanguageRouter::with_default_adapters();
        let adapter = router.try_get_adapter(path).unwrap();
        adapter.parse_file(source, path).unwrap().result
    }

    fn export_names(result: &ParseResult) -> Vec<&str> {
        result.exports.iter().map(|e| e.name.as_str()).collect()
    }

    fn function_names(result: &ParseResult) -> Vec<&str> {
        result.functions.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_typescript_facts() {
        let source = r#"import React from "react";
import { join } from 'path';
const fs = require("fs");

export interface Props { id: number }
export type Id = string;
export enum Color { Red }
export class Widget {
    render() { return null; }
}
export function build() {}
export const handler = () => 1;
function local() {}
export { local };
export default Widget;
"#;
        let result = parse("widget.ts", source);

        let imports: Vec<&str> = result.imports.iter().map(|i| i.source.as_str()).collect();
        assert_eq!(imports, vec!["react", "path", "fs"]);

        let exports = export_names(&result);
        for expected in ["Props", "Id", "Color", "Widget", "build", "handler", "local", "default"] {
            assert!(exports.contains(&expected), "missing export {}", expected);
        }

        let handler = result.functions.iter().find(|f| f.name == "handler").unwrap();
        assert_eq!(handler.kind, FunctionKind::Arrow);
        let render = result.functions.iter().find(|f| f.name == "render").unwrap();
        assert_eq!(render.kind, FunctionKind::Method);
        assert!(function_names(&result).contains(&"local"));
    }

    #[test]
    fn test_javascript_with_jsx() {
        let source = r#"import React from 'react';

export function App() {
    return <div className="app">hi</div>;
}

export const Item = () => <li />;
"#;
        let router = LanguageRouter::with_default_adapters();
        for path in ["app.js", "app.mjs", "app.cjs"] {
            assert_eq!(router.try_get_adapter(path).map(|a| a.name()), Some("tsx"));
        }

        let adapter = TreeSitterAdapter::new(Arc::new(crate::languages::typescript::TsxGrammar));
        let tree = adapter.parse_tree(source, "app.js", None).unwrap();
        assert!(!tree.root_node().has_error());

        let result = parse("app.js", source);
        assert_eq!(result.imports[0].source, "react");
        let exports = export_names(&result);
        assert!(exports.contains(&"App") && exports.contains(&"Item"));
        let item = result.functions.iter().find(|f| f.name == "Item").unwrap();
        assert_eq!(item.kind, FunctionKind::Arrow);
    }

    #[test]
    fn test_export_line_numbers() {
        let result = parse("a.ts", "\n\nexport const x = 1;\n");
        assert_eq!(result.exports.len(), 1);
        assert_eq!(result.exports[0].line, 3);
        assert_eq!(result.exports[0].kind, ExportKind::Variable);
    }

    #[test]
    fn test_rust_visibility_rules() {
        let source = r#"use std::collections::HashMap;
extern crate serde;

pub struct Config;
pub(crate) fn internal() {}
fn private() {}

impl Config {
    pub fn load() -> Self { Config }
}

pub trait Loader {
    fn load(&self);
}
"#;
        let result = parse("lib.rs", source);

        let imports: Vec<&str> = result.imports.iter().map(|i| i.source.as_str()).collect();
        assert_eq!(imports, vec!["std::collections::HashMap", "serde"]);

        assert_eq!(export_names(&result), vec!["Config", "Loader"]);

        let load_kinds: Vec<FunctionKind> = result
            .functions
            .iter()
            .filter(|f| f.name == "load")
            .map(|f| f.kind)
            .collect();
        assert_eq!(load_kinds, vec![FunctionKind::Method, FunctionKind::Method]);

        let private = result.functions.iter().find(|f| f.name == "private").unwrap();
        assert_eq!(private.kind, FunctionKind::Function);
    }

    #[test]
    fn test_python_private_names_not_exported() {
        let source = r#"import os
from . import sibling
from collections import OrderedDict

VERSION = "1.0"
_cache = {}

def public():
    def inner():
        pass

def _hidden():
    pass

class Service:
    def run(self):
        pass
"#;
        let result = parse("svc.py", source);

        let imports: Vec<&str> = result.imports.iter().map(|i| i.source.as_str()).collect();
        assert_eq!(imports, vec!["os", ".", "collections"]);
        assert_eq!(export_names(&result), vec!["VERSION", "public", "Service"]);

        let run = result.functions.iter().find(|f| f.name == "run").unwrap();
        assert_eq!(run.kind, FunctionKind::Method);
        let inner = result.functions.iter().find(|f| f.name == "inner").unwrap();
        assert_eq!(inner.kind, FunctionKind::Function);
    }

    #[test]
    fn test_go_capitalized_exports() {
        let source = r#"package server

import (
    "fmt"
    "net/http"
)

type Server struct{}
type handler interface{}

func New() *Server { return &Server{} }
func (s *Server) Start() { fmt.Println("up") }
func helper() {}
"#;
        let result = parse("server.go", source);

        let imports: Vec<&str> = result.imports.iter().map(|i| i.source.as_str()).collect();
        assert_eq!(imports, vec!["fmt", "net/http"]);

        let exports = export_names(&result);
        assert_eq!(exports, vec!["Server", "New", "Start"]);
        assert_eq!(result.exports[0].kind, ExportKind::Class);

        let start = result.functions.iter().find(|f| f.name == "Start").unwrap();
        assert_eq!(start.kind, FunctionKind::Method);
    }

    #[test]
    fn test_java_public_types() {
        let source = r#"package app;

import java.util.List;

public class App {
    public App() {}
    public void run() {}
}

class Hidden {}
"#;
        let result = parse("App.java", source);

        assert_eq!(result.imports.len(), 1);
        assert_eq!(result.imports[0].source, "java.util.List");
        assert_eq!(export_names(&result), vec!["App"]);
        assert!(result.functions.iter().all(|f| f.kind == FunctionKind::Method));
        assert_eq!(result.functions.len(), 2);
    }

    #[test]
    fn test_incremental_matches_full_parse() {
        let router = LanguageRouter::with_default_adapters();
        let adapter = router.try_get_adapter("a.ts").unwrap();

        let old = "export function a() {}\nexport const b = 1;\n";
        let new = "export function a() {}\nexport function c() {}\nexport const b = 2;\n";

        let first = adapter.parse_file(old, "a.ts").unwrap();
        let diff = find_minimal_edit(old, new).unwrap();
        let edit = calculate_edit(old, new, diff.change_start, diff.change_end, &diff.new_text);

        let incremental = adapter
            .parse_incremental(
                new,
                "a.ts",
                IncrementalInput {
                    previous_tree: first.tree,
                    edit: &edit,
                },
            )
            .unwrap();
        let full = adapter.parse_file(new, "a.ts").unwrap();

        assert_eq!(incremental.result, full.result);
        assert!(incremental.tree.is_some());
    }

    #[test]
    fn test_incremental_without_tree_is_full_parse() {
        let router = LanguageRouter::with_default_adapters();
        let adapter = router.try_get_adapter("lib.rs").unwrap();
        let source = "pub fn run() {}\n";
        let edit = calculate_edit("", source, 0, 0, source);

        let parsed = adapter
            .parse_incremental(
                source,
                "lib.rs",
                IncrementalInput {
                    previous_tree: None,
                    edit: &edit,
                },
            )
            .unwrap();
        assert_eq!(parsed.result, adapter.parse_file(source, "lib.rs").unwrap().result);
    }

    #[test]
    fn test_broken_source_still_parses() {
        let result = parse("broken.ts", "export function (");
        assert!(result.exports.len() <= 1);
    }
}
