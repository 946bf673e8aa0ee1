//! Word lookups around a cursor position.

use tower_lsp::lsp_types::Position;

use crate::document::TextDocument;

pub(crate) fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// The two words before `position`, nearest first.
///
/// Each word is the run of word characters ending just before the single
/// separator that follows it, so `this.fo|` gives `["fo", "this"]` and
/// `this.|` gives `["", "this"]`.
pub fn previous_words(document: &TextDocument, position: Position) -> Vec<String> {
    let mut rest = document.line_prefix(position);
    let mut words = Vec::with_capacity(2);
    for _ in 0..2 {
        let start = rest.trim_end_matches(is_word_char).len();
        words.push(rest[start..].to_string());
        let mut separator = rest[..start].chars();
        separator.next_back();
        rest = separator.as_str();
    }
    words
}

/// The word touching `position`, or an empty string.
pub fn word_at_position(document: &TextDocument, position: Position) -> String {
    let span = document.word_span_at(document.offset_at(position), is_word_char);
    document.text()[span].to_string()
}
