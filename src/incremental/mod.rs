pub mod coordinator;
pub mod edit;
pub mod hash;
pub mod tree_cache;

pub use coordinator::{CoordinatorStats, IncrementalCoordinator, IncrementalParserOptions, ParseOutcome};
pub use edit::{
    batch_edits, calculate_edit, edit_size_delta, find_minimal_edit, index_to_position,
    is_deletion, is_insertion, is_replacement, position_to_index, EditDiff, FileEdit, Position,
};
pub use hash::{ContentHash, HASH_VERSION};
pub use tree_cache::{TreeCache, TreeCacheStats, DEFAULT_MAX_TREES};
