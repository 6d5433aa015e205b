//! The contract between the incremental core and language-specific parsers.
//!
//! The core never inspects an adapter's tree; it only stores it between calls
//! and hands it back for the next incremental parse.

pub mod router;
pub mod syntax;

pub use router::{LanguageRouter, SharedAdapter};
pub use syntax::TreeSitterAdapter;

use crate::error::Result;
use crate::facts::ParseResult;
use crate::incremental::FileEdit;

/// Output of one adapter call: the extracted facts plus the tree to keep for
/// the next incremental parse. `tree` is `None` for adapters without tree
/// objects; only the content hash matters for later validity checks then.
#[derive(Debug)]
pub struct Parsed<T> {
    pub result: ParseResult,
    pub tree: Option<T>,
}

impl<T> Parsed<T> {
    pub fn new(result: ParseResult, tree: Option<T>) -> Self {
        Self { result, tree }
    }

    /// Result without a reusable tree.
    pub fn facts_only(result: ParseResult) -> Self {
        Self { result, tree: None }
    }
}

/// Everything an adapter needs to update a previous parse in place.
#[derive(Debug)]
pub struct IncrementalInput<'a, T> {
    /// Tree from the previous parse of the same path. `None` makes the call
    /// equivalent to a full parse.
    pub previous_tree: Option<T>,
    pub edit: &'a FileEdit,
}

/// A parser for one language family.
///
/// `parse_incremental` must produce the same [`ParseResult`] as `parse_file`
/// on the same final content; only the tree reuse may differ.
pub trait LanguageAdapter: Send + Sync {
    type Tree: Send + 'static;

    fn name(&self) -> &'static str;

    fn file_extensions(&self) -> &[&'static str];

    fn parse_file(&self, content: &str, file_path: &str) -> Result<Parsed<Self::Tree>>;

    fn parse_incremental(
        &self,
        content: &str,
        file_path: &str,
        input: IncrementalInput<'_, Self::Tree>,
    ) -> Result<Parsed<Self::Tree>>;
}
