//! Edit diffing between two versions of a document.
//!
//! All offsets are UTF-8 byte offsets, which is what tree-sitter consumes.
//! Columns in [`Position`] are byte columns for the same reason.

use serde::{Deserialize, Serialize};

/// Zero-based line/column location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl From<Position> for tree_sitter::Point {
    fn from(position: Position) -> Self {
        tree_sitter::Point::new(position.row, position.column)
    }
}

/// A single substitution: `old[change_start..change_end]` becomes `new_text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditDiff {
    pub change_start: usize,
    pub change_end: usize,
    pub new_text: String,
}

impl EditDiff {
    pub fn new(change_start: usize, change_end: usize, new_text: impl Into<String>) -> Self {
        Self {
            change_start,
            change_end,
            new_text: new_text.into(),
        }
    }

    pub fn is_insertion(&self) -> bool {
        self.change_start == self.change_end && !self.new_text.is_empty()
    }

    pub fn is_deletion(&self) -> bool {
        self.change_start < self.change_end && self.new_text.is_empty()
    }

    pub fn is_replacement(&self) -> bool {
        self.change_start < self.change_end && !self.new_text.is_empty()
    }

    /// Bytes added (positive) or removed (negative) by this edit.
    pub fn size_delta(&self) -> isize {
        self.new_text.len() as isize - self.change_end.saturating_sub(self.change_start) as isize
    }

    /// Applies the substitution to `old`.
    ///
    /// Returns `None` when the range is out of bounds or splits a character.
    pub fn apply(&self, old: &str) -> Option<String> {
        if self.change_start > self.change_end
            || self.change_end > old.len()
            || !old.is_char_boundary(self.change_start)
            || !old.is_char_boundary(self.change_end)
        {
            return None;
        }

        let mut out =
            String::with_capacity(old.len() - (self.change_end - self.change_start) + self.new_text.len());
        out.push_str(&old[..self.change_start]);
        out.push_str(&self.new_text);
        out.push_str(&old[self.change_end..]);
        Some(out)
    }

    /// Checks that applying this edit to `old` yields `new`, without allocating.
    pub fn transforms(&self, old: &str, new: &str) -> bool {
        if self.change_start > self.change_end || self.change_end > old.len() {
            return false;
        }
        let removed = self.change_end - self.change_start;
        if old.len() - removed + self.new_text.len() != new.len() {
            return false;
        }

        let inserted_end = self.change_start + self.new_text.len();
        let (old_b, new_b) = (old.as_bytes(), new.as_bytes());
        old_b[..self.change_start] == new_b[..self.change_start]
            && &new_b[self.change_start..inserted_end] == self.new_text.as_bytes()
            && old_b[self.change_end..] == new_b[inserted_end..]
    }
}

/// The edit in the shape tree-sitter's `Tree::edit` expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEdit {
    pub start_index: usize,
    pub old_end_index: usize,
    pub new_end_index: usize,
    pub start_position: Position,
    pub old_end_position: Position,
    pub new_end_position: Position,
}

impl From<&FileEdit> for tree_sitter::InputEdit {
    fn from(edit: &FileEdit) -> Self {
        tree_sitter::InputEdit {
            start_byte: edit.start_index,
            old_end_byte: edit.old_end_index,
            new_end_byte: edit.new_end_index,
            start_position: edit.start_position.into(),
            old_end_position: edit.old_end_position.into(),
            new_end_position: edit.new_end_position.into(),
        }
    }
}

/// Finds the single contiguous region that differs between `old` and `new`.
///
/// Trims the common prefix, then the common suffix (never overlapping the
/// prefix). Two disjoint changes are reported as one region spanning both;
/// this is not a multi-hunk diff. Returns `None` iff the inputs are equal.
pub fn find_minimal_edit(old: &str, new: &str) -> Option<EditDiff> {
    if old == new {
        return None;
    }

    let (old_b, new_b) = (old.as_bytes(), new.as_bytes());
    let max_prefix = old_b.len().min(new_b.len());

    let mut prefix = 0;
    while prefix < max_prefix && old_b[prefix] == new_b[prefix] {
        prefix += 1;
    }
    // a shared prefix that is a boundary in `old` is one in `new` too
    while !old.is_char_boundary(prefix) {
        prefix -= 1;
    }

    let mut old_end = old_b.len();
    let mut new_end = new_b.len();
    while old_end > prefix && new_end > prefix && old_b[old_end - 1] == new_b[new_end - 1] {
        old_end -= 1;
        new_end -= 1;
    }
    while !old.is_char_boundary(old_end) {
        old_end += 1;
        new_end += 1;
    }

    Some(EditDiff {
        change_start: prefix,
        change_end: old_end,
        new_text: new[prefix..new_end].to_string(),
    })
}

/// Builds the byte/position triple for an edit.
///
/// Start and old-end positions describe the old document; the new-end position
/// is scanned in the new document because the insertion may add lines.
pub fn calculate_edit(
    old_content: &str,
    new_content: &str,
    change_start: usize,
    change_end: usize,
    new_text: &str,
) -> FileEdit {
    let new_end_index = change_start + new_text.len();

    FileEdit {
        start_index: change_start,
        old_end_index: change_end,
        new_end_index,
        start_position: index_to_position(old_content, change_start),
        old_end_position: index_to_position(old_content, change_end),
        new_end_position: index_to_position(new_content, new_end_index),
    }
}

/// Converts a byte offset into a row/column position. Offsets past the end
/// are clamped to `content.len()`.
pub fn index_to_position(content: &str, index: usize) -> Position {
    let index = index.min(content.len());
    let mut row = 0;
    let mut line_start = 0;

    for (i, &b) in content.as_bytes()[..index].iter().enumerate() {
        if b == b'\n' {
            row += 1;
            line_start = i + 1;
        }
    }

    Position {
        row,
        column: index - line_start,
    }
}

/// Converts a row/column position back into a byte offset.
///
/// Returns `content.len()` when the position is never reached, including a
/// column past the end of its line.
pub fn position_to_index(content: &str, position: Position) -> usize {
    let mut row = 0;
    let mut column = 0;

    for (i, &b) in content.as_bytes().iter().enumerate() {
        if row == position.row && column == position.column {
            return i;
        }
        if b == b'\n' {
            row += 1;
            column = 0;
        } else {
            column += 1;
        }
    }

    content.len()
}

/// Collapses several edits into one bounding edit.
///
/// Lossy for non-adjacent edits: the text between them is not included in
/// `new_text`, so only use this for edits known to be adjacent.
pub fn batch_edits(edits: &[EditDiff]) -> Option<EditDiff> {
    match edits {
        [] => None,
        [single] => Some(single.clone()),
        _ => {
            let mut sorted: Vec<&EditDiff> = edits.iter().collect();
            sorted.sort_by_key(|e| e.change_start);

            let change_start = sorted[0].change_start;
            let change_end = sorted.iter().map(|e| e.change_end).max().unwrap_or(change_start);
            let new_text = sorted.iter().map(|e| e.new_text.as_str()).collect::<String>();

            Some(EditDiff {
                change_start,
                change_end,
                new_text,
            })
        }
    }
}

pub fn is_insertion(edit: &EditDiff) -> bool {
    edit.is_insertion()
}

pub fn is_deletion(edit: &EditDiff) -> bool {
    edit.is_deletion()
}

pub fn is_replacement(edit: &EditDiff) -> bool {
    edit.is_replacement()
}

pub fn edit_size_delta(edit: &EditDiff) -> isize {
    edit.size_delta()
}
