use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::{DirEntry, WalkBuilder};

use crate::adapter::LanguageRouter;
use crate::error::Result;

/// Lists the files under a root that the router has an adapter for.
/// `.gitignore`, `.ignore` and hidden-file rules apply.
pub struct FileWalker {
    router: Arc<LanguageRouter>,
}

impl FileWalker {
    pub fn new(router: Arc<LanguageRouter>) -> Self {
        Self { router }
    }

    /// Supported files below `root`, sorted by path.
    pub fn walk(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = WalkBuilder::new(root)
            .standard_filters(true)
            .require_git(false)
            .build()
            .filter_map(|entry| match entry {
                Ok(entry) => self.accept(entry),
                Err(e) => {
                    tracing::debug!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .collect();

        files.sort();
        Ok(files)
    }

    fn accept(&self, entry: DirEntry) -> Option<PathBuf> {
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        (is_file && self.is_supported(entry.path())).then(|| entry.into_path())
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        self.get_language(path).is_some()
    }

    /// Name of the adapter that would parse `path`.
    pub fn get_language(&self, path: &Path) -> Option<&'static str> {
        self.router
            .try_get_adapter(&path.to_string_lossy())
            .map(|adapter| adapter.name())
    }
}
