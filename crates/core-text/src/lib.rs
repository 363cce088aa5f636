//! Grapheme-aware text utilities for the single-line input box.
//!
//! `ViewState.input` is a plain `String` with `cursor` a UTF-8 byte offset
//! (§3 invariant: cursor always lies on a code-point boundary, and further,
//! on a grapheme-cluster boundary — a combining mark or ZWJ sequence must
//! move/delete as one unit). The [`grapheme`] module supplies the boundary
//! arithmetic; [`segment`] and [`width`] back it with NFC normalization and
//! display-width classification.

pub mod segment;
pub mod width; // unified grapheme width indirection

pub use width::egc_width;

/// Grapheme-boundary-aware cursor operations over a single-line `String`.
///
/// A thin wrapper, not an owning buffer: callers hold `input: String` and
/// `cursor: usize` directly (per the data model) and use these as pure
/// functions over borrowed state rather than threading a buffer type through
/// `ViewState`.
pub mod cursor {
    use crate::grapheme;

    /// Insert `text` at `cursor` (a byte offset), returning the new cursor
    /// position (end of the inserted text).
    pub fn insert(input: &mut String, cursor: usize, text: &str) -> usize {
        input.insert_str(cursor, text);
        cursor + text.len()
    }

    /// Delete the grapheme cluster before `cursor`; returns the new cursor.
    /// No-op at the start of the string.
    pub fn delete_before(input: &mut String, cursor: usize) -> usize {
        let prev = grapheme::prev_boundary(input, cursor);
        if prev == cursor {
            return cursor;
        }
        input.replace_range(prev..cursor, "");
        prev
    }

    /// Delete the grapheme cluster at `cursor`; cursor itself does not move.
    /// No-op at the end of the string.
    pub fn delete_at(input: &mut String, cursor: usize) {
        let next = grapheme::next_boundary(input, cursor);
        if next == cursor {
            return;
        }
        input.replace_range(cursor..next, "");
    }

    /// Move the cursor one grapheme cluster left.
    pub fn left(input: &str, cursor: usize) -> usize {
        grapheme::prev_boundary(input, cursor)
    }

    /// Move the cursor one grapheme cluster right.
    pub fn right(input: &str, cursor: usize) -> usize {
        grapheme::next_boundary(input, cursor)
    }
}

/// Grapheme and width utilities. Pure helpers operating on a borrowed `&str`.
pub mod grapheme {
    use crate::egc_width;
    use unicode_segmentation::UnicodeSegmentation;

    /// Iterate grapheme clusters of a string.
    pub fn iter(s: &str) -> impl Iterator<Item = &str> {
        s.graphemes(true)
    }

    /// Previous grapheme boundary (returns 0 if already at or below the first boundary).
    pub fn prev_boundary(s: &str, byte: usize) -> usize {
        if byte == 0 || byte > s.len() {
            return 0;
        }
        let mut last = 0;
        for (idx, _) in s.grapheme_indices(true) {
            if idx >= byte {
                break;
            }
            last = idx;
        }
        last
    }

    /// Next grapheme boundary (returns `s.len()` if at or beyond the end).
    pub fn next_boundary(s: &str, byte: usize) -> usize {
        if byte >= s.len() {
            return s.len();
        }
        for (idx, _) in s.grapheme_indices(true) {
            if idx > byte {
                return idx;
            }
        }
        s.len()
    }

    /// Visual column (terminal cells) up to (but not including) `byte`.
    pub fn visual_col(s: &str, byte: usize) -> usize {
        let mut col = 0;
        for (idx, g) in s.grapheme_indices(true) {
            if idx >= byte {
                break;
            }
            col += egc_width(g) as usize;
        }
        col
    }

    /// Width in terminal cells of a single grapheme cluster.
    pub fn cluster_width(g: &str) -> usize {
        egc_width(g) as usize
    }

    /// Naive word classification: alphanumeric or underscore start.
    pub fn is_word(g: &str) -> bool {
        g.chars()
            .next()
            .map(|c| c == '_' || c.is_alphanumeric())
            .unwrap_or(false)
    }
}
