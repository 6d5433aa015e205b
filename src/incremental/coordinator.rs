//! Per-file choice between serving a cached parse, updating the previous
//! tree incrementally, and parsing from scratch.
//!
//! Not safe to drive concurrently for the same path: the read-decide-write
//! sequence over the tree cache and content cache is not atomic. Callers
//! serialize per path or shard paths across coordinators.

use std::collections::HashMap;
use std::time::Instant;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::edit::{calculate_edit, find_minimal_edit, EditDiff};
use super::hash::ContentHash;
use super::tree_cache::{TreeCache, TreeCacheStats, DEFAULT_MAX_TREES};
use crate::adapter::{IncrementalInput, LanguageAdapter, Parsed};
use crate::error::Result;
use crate::facts::ParseResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementalParserOptions {
    pub max_trees: usize,
    /// When false no previous content is kept and every parse is a full parse.
    pub cache_content: bool,
}

impl Default for IncrementalParserOptions {
    fn default() -> Self {
        Self {
            max_trees: DEFAULT_MAX_TREES,
            cache_content: true,
        }
    }
}

/// What a single `parse` call did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseOutcome {
    pub result: ParseResult,
    pub was_incremental: bool,
    pub was_cached: bool,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoordinatorStats {
    pub tree_cache: TreeCacheStats,
    pub incremental_parses: u64,
    pub full_parses: u64,
    pub cached_parses: u64,
    pub total_incremental_ms: f64,
    pub total_full_ms: f64,
    pub content_cache_size: usize,
}

impl CoordinatorStats {
    pub fn avg_incremental_ms(&self) -> f64 {
        if self.incremental_parses > 0 {
            self.total_incremental_ms / self.incremental_parses as f64
        } else {
            0.0
        }
    }

    pub fn avg_full_ms(&self) -> f64 {
        if self.full_parses > 0 {
            self.total_full_ms / self.full_parses as f64
        } else {
            0.0
        }
    }
}

#[derive(Debug)]
enum Strategy {
    Cached,
    Incremental(EditDiff),
    Full,
}

pub struct IncrementalCoordinator<T> {
    trees: TreeCache<T>,
    contents: HashMap<String, String>,
    options: IncrementalParserOptions,
    incremental_parses: u64,
    full_parses: u64,
    cached_parses: u64,
    total_incremental_ms: f64,
    total_full_ms: f64,
    disposed: bool,
}

impl<T: Send + 'static> IncrementalCoordinator<T> {
    pub fn new(options: IncrementalParserOptions) -> Self {
        Self {
            trees: TreeCache::new(options.max_trees),
            contents: HashMap::new(),
            options,
            incremental_parses: 0,
            full_parses: 0,
            cached_parses: 0,
            total_incremental_ms: 0.0,
            total_full_ms: 0.0,
            disposed: false,
        }
    }

    pub fn options(&self) -> &IncrementalParserOptions {
        &self.options
    }

    /// Parses `path` at `content`, reusing whatever the caches hold.
    ///
    /// On adapter error the path is invalidated so the next call starts from
    /// a full parse.
    pub fn parse<A>(&mut self, path: &str, content: &str, adapter: &A) -> Result<ParseOutcome>
    where
        A: LanguageAdapter<Tree = T> + ?Sized,
    {
        let hash = ContentHash::of(content);
        let strategy = self.choose_strategy(path, content, &hash);
        tracing::debug!("{}: {} parse via {}", path, strategy_name(&strategy), adapter.name());

        let outcome = match strategy {
            Strategy::Cached => self.run_cached(path, content, adapter),
            Strategy::Incremental(diff) => self.run_incremental(path, content, hash, &diff, adapter),
            Strategy::Full => self.run_full(path, content, hash, adapter),
        };

        if outcome.is_err() {
            self.invalidate_one(path);
        }
        outcome
    }

    /// Like [`parse`](Self::parse) but with an edit the caller already knows
    /// (e.g. from an editor change event). The edit is checked against the
    /// cached content; a missing entry or an edit that does not produce
    /// `content` falls back to a full parse.
    pub fn parse_with_edit<A>(
        &mut self,
        path: &str,
        content: &str,
        adapter: &A,
        edit: &EditDiff,
    ) -> Result<ParseOutcome>
    where
        A: LanguageAdapter<Tree = T> + ?Sized,
    {
        let hash = ContentHash::of(content);

        let consistent = self.trees.has(path)
            && self
                .contents
                .get(path)
                .map(|old| edit.transforms(old, content))
                .unwrap_or(false);

        let outcome = if consistent {
            tracing::debug!("{}: incremental parse with supplied edit", path);
            self.run_incremental(path, content, hash, edit, adapter)
        } else {
            tracing::debug!("{}: supplied edit not applicable, full parse", path);
            self.run_full(path, content, hash, adapter)
        };

        if outcome.is_err() {
            self.invalidate_one(path);
        }
        outcome
    }

    fn choose_strategy(&self, path: &str, content: &str, hash: &ContentHash) -> Strategy {
        if !self.options.cache_content {
            return Strategy::Full;
        }
        if self.trees.is_valid(path, hash) {
            return Strategy::Cached;
        }
        if !self.trees.has(path) {
            return Strategy::Full;
        }
        match self.contents.get(path).and_then(|old| find_minimal_edit(old, content)) {
            Some(diff) => Strategy::Incremental(diff),
            None => Strategy::Full,
        }
    }

    fn run_cached<A>(&mut self, path: &str, content: &str, adapter: &A) -> Result<ParseOutcome>
    where
        A: LanguageAdapter<Tree = T> + ?Sized,
    {
        let start = Instant::now();
        // the stored tree already matches this content; only facts are re-derived
        let Parsed { result, .. } = adapter.parse_file(content, path)?;
        self.trees.mark_used(path);
        self.cached_parses += 1;

        Ok(ParseOutcome {
            result,
            was_incremental: true,
            was_cached: true,
            duration_ms: elapsed_ms(start),
        })
    }

    fn run_incremental<A>(
        &mut self,
        path: &str,
        content: &str,
        hash: ContentHash,
        diff: &EditDiff,
        adapter: &A,
    ) -> Result<ParseOutcome>
    where
        A: LanguageAdapter<Tree = T> + ?Sized,
    {
        let start = Instant::now();
        let old_content = self.contents.get(path).map(String::as_str).unwrap_or("");
        let edit = calculate_edit(
            old_content,
            content,
            diff.change_start,
            diff.change_end,
            &diff.new_text,
        );
        let previous_tree = self.trees.take_tree(path);

        let parsed = adapter.parse_incremental(
            content,
            path,
            IncrementalInput {
                previous_tree,
                edit: &edit,
            },
        )?;
        self.store(path, content, parsed.tree, hash);

        let duration_ms = elapsed_ms(start);
        self.incremental_parses += 1;
        self.total_incremental_ms += duration_ms;

        Ok(ParseOutcome {
            result: parsed.result,
            was_incremental: true,
            was_cached: false,
            duration_ms,
        })
    }

    fn run_full<A>(
        &mut self,
        path: &str,
        content: &str,
        hash: ContentHash,
        adapter: &A,
    ) -> Result<ParseOutcome>
    where
        A: LanguageAdapter<Tree = T> + ?Sized,
    {
        let start = Instant::now();
        let parsed = adapter.parse_file(content, path)?;
        self.store(path, content, parsed.tree, hash);

        let duration_ms = elapsed_ms(start);
        self.full_parses += 1;
        self.total_full_ms += duration_ms;

        Ok(ParseOutcome {
            result: parsed.result,
            was_incremental: false,
            was_cached: false,
            duration_ms,
        })
    }

    fn store(&mut self, path: &str, content: &str, tree: Option<T>, hash: ContentHash) {
        tracing::trace!("{}: caching content {}", path, hash.to_hex());
        self.trees.set(path, tree, hash);
        if self.options.cache_content {
            match self.contents.get_mut(path) {
                Some(existing) => {
                    existing.clear();
                    existing.push_str(content);
                }
                None => {
                    self.contents.insert(path.to_string(), content.to_string());
                }
            }
        }
        // eviction in the tree cache drops the matching content too
        if self.contents.len() > self.trees.len() {
            let trees = &self.trees;
            self.contents.retain(|p, _| trees.has(p));
        }
    }

    fn invalidate_one(&mut self, path: &str) {
        self.trees.invalidate(path);
        self.contents.remove(path);
    }

    pub fn invalidate<S: AsRef<str>>(&mut self, paths: &[S]) {
        for path in paths {
            self.invalidate_one(path.as_ref());
        }
    }

    /// Drops every cached path matching `pattern`; returns how many trees went.
    pub fn invalidate_pattern(&mut self, pattern: &Regex) -> usize {
        self.contents.retain(|path, _| !pattern.is_match(path));
        self.trees.invalidate_pattern(pattern)
    }

    /// [`invalidate_pattern`](Self::invalidate_pattern) from a regex source.
    pub fn invalidate_matching(&mut self, pattern: &str) -> Result<usize> {
        let pattern = Regex::new(pattern)?;
        Ok(self.invalidate_pattern(&pattern))
    }

    pub fn is_cached(&self, path: &str) -> bool {
        self.trees.has(path)
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            tree_cache: self.trees.stats(),
            incremental_parses: self.incremental_parses,
            full_parses: self.full_parses,
            cached_parses: self.cached_parses,
            total_incremental_ms: self.total_incremental_ms,
            total_full_ms: self.total_full_ms,
            content_cache_size: self.contents.len(),
        }
    }

    pub fn reset_stats(&mut self) {
        self.trees.reset_stats();
        self.incremental_parses = 0;
        self.full_parses = 0;
        self.cached_parses = 0;
        self.total_incremental_ms = 0.0;
        self.total_full_ms = 0.0;
    }

    /// Empties both caches and zeroes the stats.
    pub fn clear(&mut self) {
        self.trees.clear();
        self.contents.clear();
        self.reset_stats();
    }

    /// Releases every held tree. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.clear();
        self.trees.dispose();
        self.contents.shrink_to_fit();
        self.disposed = true;
    }
}

impl<T: Send + 'static> Default for IncrementalCoordinator<T> {
    fn default() -> Self {
        Self::new(IncrementalParserOptions::default())
    }
}

fn strategy_name(strategy: &Strategy) -> &'static str {
    match strategy {
        Strategy::Cached => "cached",
        Strategy::Incremental(_) => "incremental",
        Strategy::Full => "full",
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyzerError;
    use crate::facts::ImportFact;
    use crate::incremental::FileEdit;
    use std::sync::Mutex;

    /// Adapter whose "tree" is the content it was parsed from, recording
    /// which entry point was used.
    #[derive(Default)]
    struct RecordingAdapter {
        calls: Mutex<Vec<String>>,
        edits: Mutex<Vec<FileEdit>>,
        fail_on: Option<&'static str>,
        treeless: bool,
    }

    impl RecordingAdapter {
        fn facts(content: &str) -> ParseResult {
            ParseResult {
                imports: content
                    .lines()
                    .enumerate()
                    .filter(|(_, l)| l.starts_with("import "))
                    .map(|(i, l)| ImportFact {
                        source: l.trim_start_matches("import ").to_string(),
                        line: i as u32 + 1,
                    })
                    .collect(),
                ..ParseResult::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl LanguageAdapter for RecordingAdapter {
        type Tree = String;

        fn name(&self) -> &'static str {
            "recording"
        }

        fn file_extensions(&self) -> &[&'static str] {
            &["rec"]
        }

        fn parse_file(&self, content: &str, _file_path: &str) -> Result<Parsed<String>> {
            if self.fail_on.map(|f| content.contains(f)).unwrap_or(false) {
                return Err(AnalyzerError::Parse("boom".into()));
            }
            self.calls.lock().unwrap().push("full".into());
            if self.treeless {
                return Ok(Parsed::facts_only(Self::facts(content)));
            }
            Ok(Parsed::new(Self::facts(content), Some(content.to_string())))
        }

        fn parse_incremental(
            &self,
            content: &str,
            _file_path: &str,
            input: IncrementalInput<'_, String>,
        ) -> Result<Parsed<String>> {
            self.calls.lock().unwrap().push(match input.previous_tree {
                Some(_) => "incremental".into(),
                None => "incremental-no-tree".into(),
            });
            self.edits.lock().unwrap().push(*input.edit);
            Ok(Parsed::new(Self::facts(content), Some(content.to_string())))
        }
    }

    #[test]
    fn test_full_then_cached_then_incremental() {
        let adapter = RecordingAdapter::default();
        let mut coordinator: IncrementalCoordinator<String> = IncrementalCoordinator::default();

        let first = coordinator.parse("a.rec", "import x\n", &adapter).unwrap();
        assert!(!first.was_incremental && !first.was_cached);

        let second = coordinator.parse("a.rec", "import x\n", &adapter).unwrap();
        assert!(second.was_incremental && second.was_cached);

        let third = coordinator.parse("a.rec", "import y\n", &adapter).unwrap();
        assert!(third.was_incremental && !third.was_cached);
        assert_eq!(third.result.imports[0].source, "y");

        assert_eq!(adapter.calls(), vec!["full", "full", "incremental"]);

        let edit = adapter.edits.lock().unwrap()[0];
        assert_eq!(edit.start_index, 7);
        assert_eq!(edit.old_end_index, 8);
        assert_eq!(edit.new_end_index, 8);

        let stats = coordinator.stats();
        assert_eq!(stats.full_parses, 1);
        assert_eq!(stats.cached_parses, 1);
        assert_eq!(stats.incremental_parses, 1);
        assert_eq!(stats.content_cache_size, 1);
    }

    #[test]
    fn test_content_cache_disabled_always_full() {
        let adapter = RecordingAdapter::default();
        let mut coordinator: IncrementalCoordinator<String> =
            IncrementalCoordinator::new(IncrementalParserOptions {
                max_trees: 10,
                cache_content: false,
            });

        coordinator.parse("a.rec", "import a", &adapter).unwrap();
        let same = coordinator.parse("a.rec", "import a", &adapter).unwrap();
        let outcome = coordinator.parse("a.rec", "import b", &adapter).unwrap();

        assert!(!same.was_cached);
        assert!(!outcome.was_incremental);
        assert_eq!(coordinator.stats().full_parses, 3);
        assert_eq!(coordinator.stats().content_cache_size, 0);
    }

    #[test]
    fn test_zero_max_trees_still_caches_one_file() {
        let adapter = RecordingAdapter::default();
        let mut coordinator: IncrementalCoordinator<String> =
            IncrementalCoordinator::new(IncrementalParserOptions {
                max_trees: 0,
                cache_content: true,
            });

        coordinator.parse("a.rec", "import a", &adapter).unwrap();
        let same = coordinator.parse("a.rec", "import a", &adapter).unwrap();
        let edited = coordinator.parse("a.rec", "import b", &adapter).unwrap();

        assert!(same.was_cached);
        assert!(edited.was_incremental && !edited.was_cached);
        assert_eq!(coordinator.stats().tree_cache.max_trees, 1);
    }

    #[test]
    fn test_cached_parse_counts_tree_cache_hit() {
        let adapter = RecordingAdapter::default();
        let mut coordinator: IncrementalCoordinator<String> = IncrementalCoordinator::default();

        coordinator.parse("a.rec", "import a", &adapter).unwrap();
        coordinator.parse("a.rec", "import a", &adapter).unwrap();

        let stats = coordinator.stats().tree_cache;
        assert_eq!((stats.hits, stats.misses), (1, 0));
    }

    #[test]
    fn test_invalidate_matching_compiles_pattern() {
        let adapter = RecordingAdapter::default();
        let mut coordinator: IncrementalCoordinator<String> = IncrementalCoordinator::default();
        coordinator.parse("src/a.rec", "import a", &adapter).unwrap();
        coordinator.parse("lib/b.rec", "import b", &adapter).unwrap();

        assert_eq!(coordinator.invalidate_matching(r"^src/").unwrap(), 1);
        assert!(!coordinator.is_cached("src/a.rec"));
        assert!(coordinator.is_cached("lib/b.rec"));

        assert!(matches!(
            coordinator.invalidate_matching("(unclosed"),
            Err(AnalyzerError::InvalidPattern(_))
        ));
        assert!(coordinator.is_cached("lib/b.rec"));
    }

    #[test]
    fn test_treeless_adapter_relies_on_hash() {
        let adapter = RecordingAdapter {
            treeless: true,
            ..RecordingAdapter::default()
        };
        let mut coordinator: IncrementalCoordinator<String> = IncrementalCoordinator::default();

        coordinator.parse("a.rec", "import a", &adapter).unwrap();
        assert!(coordinator.is_cached("a.rec"));
        let same = coordinator.parse("a.rec", "import a", &adapter).unwrap();
        let edited = coordinator.parse("a.rec", "import b", &adapter).unwrap();

        assert!(same.was_cached);
        assert!(edited.was_incremental);
        assert_eq!(adapter.calls(), vec!["full", "full", "incremental-no-tree"]);
    }

    #[test]
    fn test_error_invalidates_path() {
        let adapter = RecordingAdapter {
            fail_on: Some("bad"),
            ..RecordingAdapter::default()
        };
        let mut coordinator: IncrementalCoordinator<String> = IncrementalCoordinator::default();

        coordinator.parse("a.rec", "import ok", &adapter).unwrap();
        assert!(coordinator.is_cached("a.rec"));

        coordinator.invalidate(&["a.rec"]);
        assert!(coordinator.parse("a.rec", "bad", &adapter).is_err());
        assert!(!coordinator.is_cached("a.rec"));

        let next = coordinator.parse("a.rec", "import ok", &adapter).unwrap();
        assert!(!next.was_incremental);
    }

    #[test]
    fn test_parse_with_edit_validates_edit() {
        let adapter = RecordingAdapter::default();
        let mut coordinator: IncrementalCoordinator<String> = IncrementalCoordinator::default();

        // no entry yet: full parse
        let edit = EditDiff::new(0, 0, "import a");
        let outcome = coordinator
            .parse_with_edit("a.rec", "import a", &adapter, &edit)
            .unwrap();
        assert!(!outcome.was_incremental);

        let good = EditDiff::new(7, 8, "b");
        let outcome = coordinator
            .parse_with_edit("a.rec", "import b", &adapter, &good)
            .unwrap();
        assert!(outcome.was_incremental);

        let wrong = EditDiff::new(0, 1, "z");
        let outcome = coordinator
            .parse_with_edit("a.rec", "import c", &adapter, &wrong)
            .unwrap();
        assert!(!outcome.was_incremental);

        assert_eq!(adapter.calls(), vec!["full", "incremental", "full"]);
    }

    #[test]
    fn test_eviction_drops_content_too() {
        let adapter = RecordingAdapter::default();
        let mut coordinator: IncrementalCoordinator<String> =
            IncrementalCoordinator::new(IncrementalParserOptions {
                max_trees: 2,
                cache_content: true,
            });

        for path in ["a.rec", "b.rec", "c.rec"] {
            coordinator.parse(path, "import x", &adapter).unwrap();
        }

        assert!(!coordinator.is_cached("a.rec"));
        let stats = coordinator.stats();
        assert_eq!(stats.tree_cache.size, 2);
        assert_eq!(stats.content_cache_size, 2);

        // evicted path starts over with a full parse
        let outcome = coordinator.parse("a.rec", "import y", &adapter).unwrap();
        assert!(!outcome.was_incremental);
    }

    #[test]
    fn test_invalidate_pattern_and_clear() {
        let adapter = RecordingAdapter::default();
        let mut coordinator: IncrementalCoordinator<String> = IncrementalCoordinator::default();

        for path in ["src/a.rec", "src/b.rec", "test/c.rec"] {
            coordinator.parse(path, "import x", &adapter).unwrap();
        }

        let removed = coordinator
            .invalidate_pattern(&Regex::new("^src/").unwrap());
        assert_eq!(removed, 2);
        assert!(coordinator.is_cached("test/c.rec"));
        assert_eq!(coordinator.stats().content_cache_size, 1);

        coordinator.clear();
        let stats = coordinator.stats();
        assert_eq!(stats.full_parses, 0);
        assert_eq!(stats.tree_cache.size, 0);
        assert!(!coordinator.is_cached("test/c.rec"));
    }

    #[test]
    fn test_averages_and_reset() {
        let stats = CoordinatorStats {
            incremental_parses: 4,
            total_incremental_ms: 10.0,
            ..CoordinatorStats::default()
        };
        assert!((stats.avg_incremental_ms() - 2.5).abs() < f64::EPSILON);
        assert_eq!(stats.avg_full_ms(), 0.0);

        let adapter = RecordingAdapter::default();
        let mut coordinator: IncrementalCoordinator<String> = IncrementalCoordinator::default();
        coordinator.parse("a.rec", "import x", &adapter).unwrap();
        coordinator.reset_stats();
        assert_eq!(coordinator.stats().full_parses, 0);
        // caches survive a stats reset
        assert!(coordinator.is_cached("a.rec"));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let adapter = RecordingAdapter::default();
        let mut coordinator: IncrementalCoordinator<String> = IncrementalCoordinator::default();
        coordinator.parse("a.rec", "import x", &adapter).unwrap();

        coordinator.dispose();
        coordinator.dispose();
        assert!(!coordinator.is_cached("a.rec"));
    }
}
