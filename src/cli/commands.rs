use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use code_facts::adapter::LanguageRouter;
use code_facts::config::AnalyzerConfig;
use code_facts::error::Result;
use code_facts::incremental::{IncrementalCoordinator, ParseOutcome};
use code_facts::indexer::{BatchProgress, FileEvent, FileWalker, FileWatcher};
use code_facts::worker::{ParseTask, WorkerPool, WorkerResult};

/// Files handed to the pool per `parse_files` call, so the progress bar moves.
const PROGRESS_BATCH: usize = 256;

#[derive(Parser)]
#[command(name = "code-facts")]
#[command(about = "Extract imports, exports and functions from source trees with incremental tree-sitter parsing")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Parse every supported file under the current directory
    code-facts parse

    # Same, as JSON
    code-facts parse ./src --json

    # Re-parse files incrementally as they change
    code-facts watch ./src

    # Compare cold and warm parse timings
    code-facts stats .
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to <path>/.code-facts.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a directory in parallel and print the extracted facts
    Parse {
        /// Directory to parse
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Parse a directory, then re-parse files incrementally as they change
    Watch {
        /// Directory to watch
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Parse a directory twice and print incremental parser statistics
    Stats {
        /// Directory to parse
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

fn load_config(root: &Path, config_path: Option<&Path>) -> Result<AnalyzerConfig> {
    let mut config = match config_path {
        Some(path) => AnalyzerConfig::from_file(path)?,
        None => AnalyzerConfig::discover(root)?,
    };
    config.apply_env_overrides()?;
    Ok(config)
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

pub async fn parse_directory(path: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(path, config_path)?;
    let router = Arc::new(LanguageRouter::with_default_adapters());
    let walker = FileWalker::new(Arc::clone(&router));

    let files = walker.walk(path)?;
    if !json {
        println!("Found {} files to parse", files.len());
    }

    let mut tasks = Vec::with_capacity(files.len());
    for file in &files {
        match fs::read_to_string(file) {
            Ok(content) => tasks.push(ParseTask::new(path_key(file), content)),
            Err(e) => eprintln!("Error reading {}: {}", file.display(), e),
        }
    }

    let progress = if json {
        BatchProgress::new()
    } else {
        BatchProgress::with_bar()
    };
    progress.start(tasks.len());

    let pool = WorkerPool::new(config.pool.to_options());
    let mut results: Vec<WorkerResult> = Vec::with_capacity(tasks.len());
    let mut remaining = tasks.into_iter();
    loop {
        let batch: Vec<ParseTask> = remaining.by_ref().take(PROGRESS_BATCH).collect();
        if batch.is_empty() {
            break;
        }
        for result in pool.parse_files(batch).await? {
            progress.record(&result);
            results.push(result);
        }
    }
    progress.finish();
    pool.dispose();

    if json {
        let output = serde_json::to_string_pretty(&results)?;
        println!("{}", output);
        return Ok(());
    }

    for result in &results {
        match &result.error {
            Some(error) => println!("{}  error: {}", result.file_path, error),
            None => println!(
                "{}  imports={} exports={} functions={}",
                result.file_path,
                result.result.imports.len(),
                result.result.exports.len(),
                result.result.functions.len()
            ),
        }
    }

    let snapshot = progress.snapshot();
    println!(
        "Extracted {} facts from {} files ({} errors) in {}ms",
        snapshot.facts,
        snapshot.done(),
        snapshot.failed,
        snapshot.elapsed_ms
    );

    Ok(())
}

fn parse_one(
    coordinator: &mut IncrementalCoordinator<tree_sitter::Tree>,
    router: &LanguageRouter,
    file: &Path,
) -> Result<Option<ParseOutcome>> {
    let key = path_key(file);
    let Some(adapter) = router.try_get_adapter(&key) else {
        return Ok(None);
    };
    let content = fs::read_to_string(file)?;
    coordinator.parse(&key, &content, &*adapter).map(Some)
}

fn describe(outcome: &ParseOutcome) -> &'static str {
    match (outcome.was_incremental, outcome.was_cached) {
        (_, true) => "unchanged",
        (true, false) => "incremental",
        (false, _) => "full",
    }
}

pub fn watch_directory(path: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(path, config_path)?;
    let router = Arc::new(LanguageRouter::with_default_adapters());
    let walker = FileWalker::new(Arc::clone(&router));
    let mut coordinator = IncrementalCoordinator::new(config.parser.clone());

    // watcher events carry absolute paths; cache keys must match them
    let path = &path.canonicalize()?;
    let files = walker.walk(path)?;
    for file in &files {
        if let Err(e) = parse_one(&mut coordinator, &router, file) {
            eprintln!("Error parsing {}: {}", file.display(), e);
        }
    }
    println!("Parsed {} files", files.len());
    println!("Watching for changes...");

    let watcher = FileWatcher::new(path)?;
    loop {
        let Some(events) = watcher.recv()? else {
            continue;
        };
        for event in events {
            match event {
                FileEvent::Modified(file) => match parse_one(&mut coordinator, &router, &file) {
                    Ok(Some(outcome)) => println!(
                        "Updated {} ({}, {:.2}ms): {} imports, {} exports, {} functions",
                        file.display(),
                        describe(&outcome),
                        outcome.duration_ms,
                        outcome.result.imports.len(),
                        outcome.result.exports.len(),
                        outcome.result.functions.len()
                    ),
                    Ok(None) => {}
                    Err(e) => eprintln!("Error parsing {}: {}", file.display(), e),
                },
                FileEvent::Deleted(file) => {
                    let key = path_key(&file);
                    if coordinator.is_cached(&key) {
                        coordinator.invalidate(&[key]);
                        println!("Removed {}", file.display());
                    }
                }
            }
        }
    }
}

pub fn show_stats(path: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(path, config_path)?;
    let router = Arc::new(LanguageRouter::with_default_adapters());
    let walker = FileWalker::new(Arc::clone(&router));
    let mut coordinator = IncrementalCoordinator::new(config.parser.clone());

    let files = walker.walk(path)?;
    // cold pass fills the caches, warm pass should hit them
    for _ in 0..2 {
        for file in &files {
            if let Err(e) = parse_one(&mut coordinator, &router, file) {
                eprintln!("Error parsing {}: {}", file.display(), e);
            }
        }
    }

    let stats = coordinator.stats();
    coordinator.dispose();

    if json {
        let output = serde_json::to_string_pretty(&stats)?;
        println!("{}", output);
        return Ok(());
    }

    println!("Files:               {}", files.len());
    println!("Full parses:         {}", stats.full_parses);
    println!("Incremental parses:  {}", stats.incremental_parses);
    println!("Cached parses:       {}", stats.cached_parses);
    println!("Avg full parse:      {:.2}ms", stats.avg_full_ms());
    println!("Avg incremental:     {:.2}ms", stats.avg_incremental_ms());
    println!(
        "Tree cache:          {}/{} trees, {:.1}% hit rate, {} evictions",
        stats.tree_cache.size,
        stats.tree_cache.max_trees,
        stats.tree_cache.hit_rate() * 100.0,
        stats.tree_cache.evictions
    );

    Ok(())
}
