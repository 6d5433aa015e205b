//! Incremental multi-language fact extraction.
//!
//! Files are parsed with tree-sitter into [`ParseResult`]s (imports, exports,
//! functions). [`IncrementalCoordinator`] reuses the previous tree of each file
//! when its content changes by a local edit; [`WorkerPool`] spreads large
//! batches across threads.

pub mod adapter;
pub mod config;
pub mod error;
pub mod facts;
pub mod incremental;
pub mod indexer;
pub mod languages;
pub mod worker;

pub use adapter::{IncrementalInput, LanguageAdapter, LanguageRouter, Parsed, TreeSitterAdapter};
pub use config::{AnalyzerConfig, PoolConfig};
pub use error::{AnalyzerError, Result};
pub use facts::{ExportFact, ExportKind, FunctionFact, FunctionKind, ImportFact, ParseResult};
pub use incremental::{
    CoordinatorStats, EditDiff, FileEdit, IncrementalCoordinator, IncrementalParserOptions,
    ParseOutcome, Position, TreeCache,
};
pub use worker::{ParseTask, PoolStats, WorkerPool, WorkerPoolOptions, WorkerResult};
