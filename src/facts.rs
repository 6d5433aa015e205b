//! Language-agnostic facts extracted from a single source file.
//!
//! The incremental pipeline never looks inside these values; it only passes
//! them from the adapters to the caller. Downstream consumers (framework
//! detection, dependency graphs) read them.

use serde::{Deserialize, Serialize};

/// Facts extracted from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResult {
    pub imports: Vec<ImportFact>,
    pub exports: Vec<ExportFact>,
    pub functions: Vec<FunctionFact>,
}

impl ParseResult {
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty() && self.exports.is_empty() && self.functions.is_empty()
    }

    pub fn fact_count(&self) -> usize {
        self.imports.len() + self.exports.len() + self.functions.len()
    }

    /// Sorts every fact list by line, then name, so results from different
    /// query match orders compare equal.
    pub fn normalize(&mut self) {
        self.imports
            .sort_by(|a, b| (a.line, &a.source).cmp(&(b.line, &b.source)));
        self.imports.dedup();
        self.exports
            .sort_by(|a, b| (a.line, &a.name).cmp(&(b.line, &b.name)));
        self.exports.dedup();
        self.functions
            .sort_by(|a, b| (a.line, &a.name).cmp(&(b.line, &b.name)));
        self.functions.dedup();
    }
}

/// An import / dependency reference (e.g. `"react"`, `std::collections::HashMap`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFact {
    /// Imported module path with surrounding quotes stripped
    pub source: String,
    /// 1-based line of the import
    pub line: u32,
}

/// A symbol made visible to other modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportFact {
    pub name: String,
    pub kind: ExportKind,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Function,
    Class,
    Interface,
    Type,
    Enum,
    Variable,
    Module,
    Default,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Function => "function",
            ExportKind::Class => "class",
            ExportKind::Interface => "interface",
            ExportKind::Type => "type",
            ExportKind::Enum => "enum",
            ExportKind::Variable => "variable",
            ExportKind::Module => "module",
            ExportKind::Default => "default",
        }
    }

    /// Maps a query capture name to an export kind.
    pub fn from_capture(capture: &str) -> Option<Self> {
        match capture {
            "function" => Some(ExportKind::Function),
            "class" | "struct" | "record" => Some(ExportKind::Class),
            "interface" | "trait" => Some(ExportKind::Interface),
            "type" | "type_alias" => Some(ExportKind::Type),
            "enum" => Some(ExportKind::Enum),
            "variable" | "constant" => Some(ExportKind::Variable),
            "module" => Some(ExportKind::Module),
            "default" => Some(ExportKind::Default),
            _ => None,
        }
    }
}

/// A declared function, method or named closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionFact {
    pub name: String,
    pub kind: FunctionKind,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    Function,
    Method,
    Arrow,
}

impl FunctionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionKind::Function => "function",
            FunctionKind::Method => "method",
            FunctionKind::Arrow => "arrow",
        }
    }
}
