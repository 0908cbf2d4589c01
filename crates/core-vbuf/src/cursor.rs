//! The reading cursor: an absolute offset into a document's flat text with
//! character/word/line movement.
//!
//! Offsets are byte positions that always sit on a grapheme boundary.
//! Movement returns the text of the granule landed on, or `None` at a
//! boundary; hitting a boundary plays the `boundary` earcon, and a
//! configured wrap plays `wrap` and continues from the opposite edge.
//! Word and line reads exclude the `\n` separators the builder injected.

use std::sync::Arc;

use core_speech::{CueKind, CueSink};
use unicode_segmentation::UnicodeSegmentation;

use crate::{VDocument, VNode};

/// Movement granularity, used by read-current commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granule {
    Char,
    Word,
    Line,
}

pub struct Cursor {
    offset: usize,
    /// False until the cursor first lands somewhere: a fresh cursor sits
    /// before the document, so it has no current node and quick-nav starts
    /// from the top.
    placed: bool,
    wrap: bool,
    cues: Arc<dyn CueSink>,
}

impl Cursor {
    pub fn new(cues: Arc<dyn CueSink>) -> Self {
        Self {
            offset: 0,
            placed: false,
            wrap: false,
            cues,
        }
    }

    pub fn with_wrap(mut self, wrap: bool) -> Self {
        self.wrap = wrap;
        self
    }

    pub fn set_wrap(&mut self, wrap: bool) {
        self.wrap = wrap;
    }

    pub fn wrap(&self) -> bool {
        self.wrap
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Place the cursor, clamping into the text and snapping back to a
    /// grapheme boundary.
    pub fn move_to(&mut self, doc: &VDocument, offset: usize) {
        let text = doc.flat_text();
        let clamped = offset.min(text.len());
        self.offset = snap_to_boundary(text, clamped);
        self.placed = true;
    }

    pub fn is_placed(&self) -> bool {
        self.placed
    }

    pub fn current_node<'d>(&self, doc: &'d VDocument) -> Option<&'d VNode> {
        if !self.placed {
            return None;
        }
        doc.find_node_at_offset(self.offset)
    }

    fn boundary(&self) -> Option<String> {
        self.cues.play(CueKind::Boundary);
        None
    }

    fn wrapped(&self, text: String) -> Option<String> {
        self.cues.play(CueKind::Wrap);
        Some(text)
    }

    // ---------------------------------------------------------------------
    // Characters
    // ---------------------------------------------------------------------

    pub fn next_char(&mut self, doc: &VDocument) -> Option<String> {
        let text = doc.flat_text();
        let Some(current) = grapheme_at(text, self.offset) else {
            return self.boundary();
        };
        let next = self.offset + current.len();
        if let Some(cluster) = grapheme_at(text, next) {
            self.offset = next;
            self.placed = true;
            return Some(cluster.to_string());
        }
        if self.wrap {
            self.offset = 0;
            self.placed = true;
            let cluster = grapheme_at(text, 0)?.to_string();
            return self.wrapped(cluster);
        }
        self.boundary()
    }

    pub fn prev_char(&mut self, doc: &VDocument) -> Option<String> {
        let text = doc.flat_text();
        if text.is_empty() {
            return self.boundary();
        }
        if self.offset == 0 {
            if self.wrap {
                let last = last_grapheme_start(text);
                self.offset = last;
                self.placed = true;
                let cluster = grapheme_at(text, last)?.to_string();
                return self.wrapped(cluster);
            }
            return self.boundary();
        }
        let prev = prev_boundary(text, self.offset);
        self.offset = prev;
        self.placed = true;
        grapheme_at(text, prev).map(str::to_string)
    }

    pub fn current_char(&self, doc: &VDocument) -> Option<String> {
        grapheme_at(doc.flat_text(), self.offset).map(str::to_string)
    }

    // ---------------------------------------------------------------------
    // Words
    // ---------------------------------------------------------------------

    /// Skip the rest of the current word, then whitespace, landing on the
    /// next word's first character.
    pub fn next_word(&mut self, doc: &VDocument) -> Option<String> {
        let text = doc.flat_text();
        let mut pos = self.offset;
        pos = skip_while(text, pos, |c| !c.is_whitespace());
        pos = skip_while(text, pos, char::is_whitespace);
        if pos < text.len() {
            self.offset = pos;
            self.placed = true;
            return Some(word_at(text, pos));
        }
        if self.wrap {
            let first = skip_while(text, 0, char::is_whitespace);
            if first < text.len() {
                self.offset = first;
                self.placed = true;
                return self.wrapped(word_at(text, first));
            }
        }
        self.boundary()
    }

    /// Step back over whitespace, then over the word, landing on its start.
    pub fn prev_word(&mut self, doc: &VDocument) -> Option<String> {
        let text = doc.flat_text();
        let start = word_start_before(text, self.offset);
        if let Some(start) = start {
            self.offset = start;
            self.placed = true;
            return Some(word_at(text, start));
        }
        if self.wrap {
            if let Some(last) = last_word_start(text) {
                self.offset = last;
                self.placed = true;
                return self.wrapped(word_at(text, last));
            }
        }
        self.boundary()
    }

    pub fn current_word(&self, doc: &VDocument) -> Option<String> {
        let text = doc.flat_text();
        let c = text[self.offset..].chars().next()?;
        if c.is_whitespace() {
            return None;
        }
        // Rewind to the word start, then read forward.
        let start = text[..self.offset]
            .rfind(char::is_whitespace)
            .map(|i| i + text[i..].chars().next().map_or(1, char::len_utf8))
            .unwrap_or(0);
        Some(word_at(text, start))
    }

    // ---------------------------------------------------------------------
    // Lines
    // ---------------------------------------------------------------------

    pub fn next_line(&mut self, doc: &VDocument) -> Option<String> {
        let text = doc.flat_text();
        if text.is_empty() {
            return self.boundary();
        }
        match text[self.offset..].find('\n') {
            Some(at) if self.offset + at + 1 < text.len() => {
                self.offset += at + 1;
                self.placed = true;
                Some(line_at(text, self.offset))
            }
            _ => {
                if self.wrap {
                    self.offset = 0;
                    self.placed = true;
                    return self.wrapped(line_at(text, 0));
                }
                self.boundary()
            }
        }
    }

    pub fn prev_line(&mut self, doc: &VDocument) -> Option<String> {
        let text = doc.flat_text();
        if text.is_empty() {
            return self.boundary();
        }
        let current_start = line_start(text, self.offset);
        if current_start == 0 {
            if self.wrap {
                let last = line_start(text, text.len().saturating_sub(1));
                self.offset = last;
                self.placed = true;
                return self.wrapped(line_at(text, last));
            }
            return self.boundary();
        }
        let prev_start = line_start(text, current_start - 1);
        self.offset = prev_start;
        self.placed = true;
        Some(line_at(text, prev_start))
    }

    pub fn current_line(&self, doc: &VDocument) -> Option<String> {
        let text = doc.flat_text();
        if text.is_empty() || self.offset >= text.len() {
            return None;
        }
        Some(line_at(text, line_start(text, self.offset)))
    }
}

// -------------------------------------------------------------------------
// Flat-text helpers
// -------------------------------------------------------------------------

fn grapheme_at(text: &str, offset: usize) -> Option<&str> {
    if offset >= text.len() {
        return None;
    }
    text[offset..].graphemes(true).next()
}

fn prev_boundary(text: &str, offset: usize) -> usize {
    text[..offset]
        .grapheme_indices(true)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn last_grapheme_start(text: &str) -> usize {
    prev_boundary(text, text.len())
}

/// Largest grapheme start at or before `offset`. Offsets inside a cluster
/// (or inside a multi-byte scalar) snap to the cluster's start.
fn snap_to_boundary(text: &str, offset: usize) -> usize {
    if offset >= text.len() {
        return text.len();
    }
    let mut snapped = 0;
    for (start, _) in text.grapheme_indices(true) {
        if start > offset {
            break;
        }
        snapped = start;
    }
    snapped
}

fn skip_while(text: &str, mut pos: usize, pred: impl Fn(char) -> bool) -> usize {
    for c in text[pos..].chars() {
        if !pred(c) {
            break;
        }
        pos += c.len_utf8();
    }
    pos
}

/// The non-whitespace run starting at `pos`.
fn word_at(text: &str, pos: usize) -> String {
    text[pos..]
        .chars()
        .take_while(|c| !c.is_whitespace())
        .collect()
}

/// Word start reached by stepping back over whitespace, then over the word.
/// Mid-word this is the current word's start; at a word start it is the
/// previous word's. `None` when no movement is possible.
fn word_start_before(text: &str, offset: usize) -> Option<usize> {
    let mut pos = offset;
    while pos > 0 {
        let c = text[..pos].chars().next_back()?;
        if !c.is_whitespace() {
            break;
        }
        pos -= c.len_utf8();
    }
    while pos > 0 {
        let c = text[..pos].chars().next_back()?;
        if c.is_whitespace() {
            break;
        }
        pos -= c.len_utf8();
    }
    // Valid only if we moved and landed on a word character.
    (pos < offset && text[pos..].chars().next().map_or(false, |c| !c.is_whitespace()))
        .then_some(pos)
}

fn last_word_start(text: &str) -> Option<usize> {
    let mut pos = text.len();
    while pos > 0 {
        let c = text[..pos].chars().next_back()?;
        if !c.is_whitespace() {
            break;
        }
        pos -= c.len_utf8();
    }
    if pos == 0 {
        return None;
    }
    let mut start = pos;
    while start > 0 {
        let c = text[..start].chars().next_back()?;
        if c.is_whitespace() {
            break;
        }
        start -= c.len_utf8();
    }
    Some(start)
}

/// Start offset of the line containing `offset`.
fn line_start(text: &str, offset: usize) -> usize {
    text[..offset.min(text.len())]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(0)
}

/// Line content from `start` to (excluding) the next separator.
fn line_at(text: &str, start: usize) -> String {
    match text[start..].find('\n') {
        Some(at) => text[start..start + at].to_string(),
        None => text[start..].to_string(),
    }
}
