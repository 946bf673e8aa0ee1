//! Text documents and position conversion.
//!
//! Offsets are UTF-8 byte offsets into the document text. LSP positions use
//! line/column where column is counted in UTF-16 code units.

use std::ops::Range as Span;
use std::sync::Arc;

use tower_lsp::lsp_types::{Position, Range, Url};

/// Pre-computed line starts for a source text.
///
/// A virtual document shares the line index of the document it was derived
/// from, so conversions always use the source characters for UTF-16 columns.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset where each line starts.
    line_starts: Vec<usize>,
    source: Arc<str>,
}

impl LineIndex {
    pub fn new(source: Arc<str>) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            line_starts,
            source,
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte range of a line's content, excluding its terminator (`\n` or `\r\n`).
    pub fn line_span(&self, line: usize) -> Option<Span<usize>> {
        let start = *self.line_starts.get(line)?;
        let mut end = self
            .line_starts
            .get(line + 1)
            .map(|&next| next - 1)
            .unwrap_or(self.source.len());
        if end > start && self.source.as_bytes()[end - 1] == b'\r' {
            end -= 1;
        }
        Some(start..end)
    }

    /// Convert a byte offset to an LSP position. Offsets past the end clamp to it.
    pub fn offset_to_position(&self, offset: usize) -> Position {
        let offset = offset.min(self.source.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };

        let line_start = self.line_starts[line];
        let col: usize = self.source[line_start..]
            .char_indices()
            .take_while(|(i, _)| line_start + i < offset)
            .map(|(_, c)| c.len_utf16())
            .sum();

        Position::new(line as u32, col as u32)
    }

    /// Convert an LSP position to a byte offset.
    ///
    /// Columns past the end of a line clamp to the line end; lines past the
    /// end of the document yield `None`.
    pub fn position_to_offset(&self, position: Position) -> Option<usize> {
        let span = self.line_span(position.line as usize)?;

        let mut utf16_col = 0u32;
        for (i, c) in self.source[span.clone()].char_indices() {
            if utf16_col >= position.character {
                return Some(span.start + i);
            }
            utf16_col += c.len_utf16() as u32;
        }
        Some(span.end)
    }

    pub fn span_to_range(&self, span: &Span<usize>) -> Range {
        Range::new(
            self.offset_to_position(span.start),
            self.offset_to_position(span.end),
        )
    }

    pub fn range_to_span(&self, range: Range) -> Option<Span<usize>> {
        let start = self.position_to_offset(range.start)?;
        let end = self.position_to_offset(range.end)?;
        Some(start..end.max(start))
    }
}

/// A document as seen by the server: identity, version and content.
///
/// Host documents are created from editor notifications. Virtual documents
/// are produced by [`DocumentRegions`](super::DocumentRegions) and carry the
/// host's URI, version and line index with masked text.
#[derive(Debug, Clone)]
pub struct TextDocument {
    uri: Url,
    language_id: String,
    version: i32,
    text: Arc<str>,
    line_index: Arc<LineIndex>,
}

impl TextDocument {
    pub fn new(uri: Url, language_id: impl Into<String>, version: i32, text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let line_index = Arc::new(LineIndex::new(Arc::clone(&text)));
        Self {
            uri,
            language_id: language_id.into(),
            version,
            text,
            line_index,
        }
    }

    /// A view of this document with different text of the same byte layout.
    pub(crate) fn with_masked_text(&self, language_id: &str, text: String) -> Self {
        debug_assert_eq!(text.len(), self.text.len());
        Self {
            uri: self.uri.clone(),
            language_id: language_id.to_string(),
            version: self.version,
            text: text.into(),
            line_index: Arc::clone(&self.line_index),
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn language_id(&self) -> &str {
        &self.language_id
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.line_index.line_count()
    }

    pub fn offset_at(&self, position: Position) -> usize {
        self.line_index
            .position_to_offset(position)
            .unwrap_or(self.text.len())
    }

    pub fn position_at(&self, offset: usize) -> Position {
        self.line_index.offset_to_position(offset)
    }

    pub fn span_to_range(&self, span: &Span<usize>) -> Range {
        self.line_index.span_to_range(span)
    }

    pub fn range_to_span(&self, range: Range) -> Option<Span<usize>> {
        self.line_index.range_to_span(range)
    }

    /// Raw text of a line of this document, without its terminator.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let span = self.line_index.line_span(line as usize)?;
        self.text.get(span)
    }

    /// Text of the line containing `position`, up to the position.
    pub fn line_prefix(&self, position: Position) -> &str {
        let offset = self.offset_at(position);
        let start = self
            .line_index
            .line_span(position.line as usize)
            .map(|s| s.start)
            .unwrap_or(offset);
        self.text.get(start..offset).unwrap_or_default()
    }

    /// Byte span of the run of `is_word` characters around `offset`.
    ///
    /// Empty when the offset touches no word character.
    pub fn word_span_at(&self, offset: usize, is_word: impl Fn(char) -> bool) -> Span<usize> {
        let offset = offset.min(self.text.len());
        let before = self.text.get(..offset).unwrap_or_default();
        let after = self.text.get(offset..).unwrap_or_default();
        let start = before.trim_end_matches(&is_word).len();
        let end = offset + (after.len() - after.trim_start_matches(&is_word).len());
        start..end
    }
}
