//! Byte-range edits over original source text.
//!
//! The fix engine never pretty-prints a file. Every fix is expressed as a
//! replacement of one byte range (insertions are zero-width ranges), and
//! the whole set is spliced into the original text in one pass, so bytes
//! outside the edited ranges are preserved exactly.

use anyhow::{bail, Result};

#[derive(Debug, Clone)]
struct Edit {
    start: usize,
    end: usize,
    replacement: String,
    seq: usize,
}

/// An ordered set of non-overlapping byte-range edits.
#[derive(Debug, Default)]
pub struct EditSet {
    edits: Vec<Edit>,
}

impl EditSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Replace the bytes in `start..end` with `replacement`.
    pub fn replace(&mut self, start: usize, end: usize, replacement: impl Into<String>) {
        let seq = self.edits.len();
        self.edits.push(Edit {
            start,
            end,
            replacement: replacement.into(),
            seq,
        });
    }

    /// Insert `text` at byte offset `at`. Multiple insertions at the same
    /// offset keep their insertion order.
    pub fn insert(&mut self, at: usize, text: impl Into<String>) {
        self.replace(at, at, text);
    }

    /// Splice all edits into `source`, failing on out-of-range or
    /// overlapping ranges.
    pub fn apply(mut self, source: &str) -> Result<String> {
        self.edits.sort_by_key(|e| (e.start, e.end, e.seq));

        let mut output = String::with_capacity(source.len());
        let mut cursor = 0usize;
        for edit in &self.edits {
            if edit.end > source.len() || edit.start > edit.end {
                bail!(
                    "edit range {}..{} out of bounds for {} bytes",
                    edit.start,
                    edit.end,
                    source.len()
                );
            }
            if edit.start < cursor {
                bail!("overlapping edits at byte {}", edit.start);
            }
            output.push_str(&source[cursor..edit.start]);
            output.push_str(&edit.replacement);
            cursor = edit.end;
        }
        output.push_str(&source[cursor..]);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_and_insert() {
        let mut edits = EditSet::new();
        edits.replace(5, 10, "earth");
        edits.insert(0, ">> ");
        let out = edits.apply("dear world, hello").unwrap();
        assert_eq!(out, ">> dear earth, hello");
    }

    #[test]
    fn test_same_offset_insertions_keep_order() {
        let mut edits = EditSet::new();
        edits.insert(5, "a");
        edits.insert(5, "b");
        let out = edits.apply("01234").unwrap();
        assert_eq!(out, "01234ab");
    }

    #[test]
    fn test_overlap_is_rejected() {
        let mut edits = EditSet::new();
        edits.replace(0, 4, "x");
        edits.replace(2, 6, "y");
        assert!(edits.apply("0123456789").is_err());
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let mut edits = EditSet::new();
        edits.replace(0, 100, "x");
        assert!(edits.apply("short").is_err());
    }

    #[test]
    fn test_untouched_bytes_are_identical() {
        let source = "line one\nline two\nline three\n";
        let mut edits = EditSet::new();
        edits.replace(9, 17, "LINE TWO");
        let out = edits.apply(source).unwrap();
        assert_eq!(out, "line one\nLINE TWO\nline three\n");
        // bytes before and after the edited range are the originals
        assert_eq!(&out[..9], &source[..9]);
        assert_eq!(&out[17..], &source[17..]);
    }
}
