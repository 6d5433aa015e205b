use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::{LanguageAdapter, TreeSitterAdapter};
use crate::languages::default_grammars;

/// Adapter handle shared between the router and its callers.
pub type SharedAdapter = Arc<dyn LanguageAdapter<Tree = tree_sitter::Tree>>;

/// Extension-based dispatch from a file path to its adapter.
pub struct LanguageRouter {
    adapters: HashMap<String, SharedAdapter>,
    extension_map: HashMap<String, String>,
}

impl LanguageRouter {
    /// An empty router; see [`LanguageRouter::with_default_adapters`].
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
            extension_map: HashMap::new(),
        }
    }

    /// Router populated from the static grammar table.
    pub fn with_default_adapters() -> Self {
        let mut router = Self::new();
        for grammar in default_grammars() {
            router.register_adapter(Arc::new(TreeSitterAdapter::new(grammar)));
        }
        router
    }

    /// Registers `adapter` under its name and every extension it claims.
    /// A later registration wins for overlapping extensions.
    pub fn register_adapter(&mut self, adapter: SharedAdapter) {
        let name = adapter.name().to_string();
        for ext in adapter.file_extensions() {
            self.extension_map.insert(ext.to_ascii_lowercase(), name.clone());
        }
        self.adapters.insert(name, adapter);
    }

    pub fn get_by_name(&self, name: &str) -> Option<SharedAdapter> {
        self.adapters.get(name).cloned()
    }

    pub fn get_by_extension(&self, ext: &str) -> Option<SharedAdapter> {
        self.extension_map
            .get(&ext.to_ascii_lowercase())
            .and_then(|name| self.get_by_name(name))
    }

    pub fn try_get_adapter(&self, file_path: &str) -> Option<SharedAdapter> {
        Path::new(file_path)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| self.get_by_extension(ext))
    }

    pub fn is_supported(&self, file_path: &str) -> bool {
        self.try_get_adapter(file_path).is_some()
    }

    pub fn supported_extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.extension_map.keys().map(|s| s.as_str()).collect();
        exts.sort_unstable();
        exts
    }

    pub fn supported_languages(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.adapters.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Drops every registered adapter.
    pub fn dispose(&mut self) {
        self.adapters.clear();
        self.extension_map.clear();
    }
}

impl Default for LanguageRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LanguageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageRouter")
            .field("languages", &self.supported_languages())
            .finish()
    }
}
