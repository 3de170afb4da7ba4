//! Byte/character offset conversion
//!
//! `regex` reports byte offsets; spans carry character offsets. Every
//! conversion goes through this index so multi-byte text (Hangul, CJK)
//! never produces split code points.

pub(crate) struct CharIndex<'a> {
    text: &'a str,
    /// Byte offset of every char, plus `text.len()` as a sentinel
    offsets: Vec<usize>,
}

impl<'a> CharIndex<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        let mut offsets: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        offsets.push(text.len());
        Self { text, offsets }
    }

    pub(crate) fn char_len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Character offset of a byte offset lying on a char boundary
    pub(crate) fn to_char(&self, byte: usize) -> usize {
        match self.offsets.binary_search(&byte) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        }
    }

    /// Byte offset of a character offset, saturating at the end
    pub(crate) fn to_byte(&self, ch: usize) -> usize {
        self.offsets[ch.min(self.char_len())]
    }

    /// Substring between two character offsets
    pub(crate) fn slice(&self, start: usize, end: usize) -> &'a str {
        let (b_start, b_end) = (self.to_byte(start), self.to_byte(end.max(start)));
        &self.text[b_start..b_end]
    }
}

/// Character preceding `byte` in `text`
pub(crate) fn char_before(text: &str, byte: usize) -> Option<char> {
    text.get(..byte).and_then(|s| s.chars().next_back())
}

/// Character starting at `byte` in `text`
pub(crate) fn char_after(text: &str, byte: usize) -> Option<char> {
    text.get(byte..).and_then(|s| s.chars().next())
}

/// Occurrences of `needle` in `haystack` as character offsets
pub(crate) fn find_char_offsets(haystack: &str, needle: &str) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    let index = CharIndex::new(haystack);
    haystack
        .match_indices(needle)
        .map(|(byte, _)| index.to_char(byte))
        .collect()
}
