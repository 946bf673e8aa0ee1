//! Brace matching over masked single-language text.
//!
//! Strings and comments are skipped so that braces inside them do not
//! count. Shared by the style and script modes for folding and diagnostics.

use tower_lsp::lsp_types::{FoldingRange, FoldingRangeKind};

use crate::document::TextDocument;

/// Comment syntax of the scanned language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Syntax {
    /// `//` starts a comment running to the end of the line.
    pub line_comments: bool,
    /// Backtick strings, as in template literals.
    pub backtick_strings: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Braces {
    /// Matched `{`/`}` byte offsets, ordered by the closing brace.
    pub pairs: Vec<(usize, usize)>,
    /// `{` never closed.
    pub unclosed: Vec<usize>,
    /// `}` with nothing to close.
    pub unopened: Vec<usize>,
    /// Byte spans of comments, in order.
    pub comments: Vec<std::ops::Range<usize>>,
}

impl Braces {
    pub fn in_comment(&self, offset: usize) -> bool {
        self.comments.iter().any(|c| c.contains(&offset))
    }
}

pub(crate) fn scan(text: &str, syntax: Syntax) -> Braces {
    let bytes = text.as_bytes();
    let mut braces = Braces::default();
    let mut open: Vec<usize> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = text[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |p| i + 2 + p + 2);
                braces.comments.push(i..end);
                i = end;
                continue;
            }
            b'/' if syntax.line_comments && bytes.get(i + 1) == Some(&b'/') => {
                let end = text[i..].find('\n').map_or(bytes.len(), |p| i + p);
                braces.comments.push(i..end);
                i = end;
                continue;
            }
            quote @ (b'"' | b'\'') => {
                i = skip_string(bytes, i, quote, false);
                continue;
            }
            b'`' if syntax.backtick_strings => {
                i = skip_string(bytes, i, b'`', true);
                continue;
            }
            b'{' => open.push(i),
            b'}' => match open.pop() {
                Some(start) => braces.pairs.push((start, i)),
                None => braces.unopened.push(i),
            },
            _ => {}
        }
        i += 1;
    }

    braces.unclosed = open;
    braces
}

/// Offset just past the closing quote. Single-line strings stop at a newline.
fn skip_string(bytes: &[u8], start: usize, quote: u8, multiline: bool) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' if !multiline => return i,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Folding ranges for brace pairs spanning more than one line.
///
/// The closing line stays visible, so a block folds from the line of its
/// `{` to the line before its `}`.
pub(crate) fn folding_ranges(document: &TextDocument, braces: &Braces) -> Vec<FoldingRange> {
    let mut ranges: Vec<FoldingRange> = braces
        .pairs
        .iter()
        .filter_map(|&(open, close)| {
            let start_line = document.position_at(open).line;
            let end_line = document.position_at(close).line.checked_sub(1)?;
            (end_line > start_line).then(|| FoldingRange {
                start_line,
                start_character: None,
                end_line,
                end_character: None,
                kind: None,
                collapsed_text: None,
            })
        })
        .collect();

    ranges.extend(braces.comments.iter().filter_map(|comment| {
        let start_line = document.position_at(comment.start).line;
        let end_line = document.position_at(comment.end).line;
        (end_line > start_line).then(|| FoldingRange {
            start_line,
            start_character: None,
            end_line,
            end_character: None,
            kind: Some(FoldingRangeKind::Comment),
            collapsed_text: None,
        })
    }));

    ranges.sort_by_key(|r| (r.start_line, r.end_line));
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSS: Syntax = Syntax {
        line_comments: false,
        backtick_strings: false,
    };
    const JS: Syntax = Syntax {
        line_comments: true,
        backtick_strings: true,
    };

    #[test]
    fn matches_nested_pairs() {
        let braces = scan("a{b{}c}", CSS);
        assert_eq!(braces.pairs, vec![(3, 4), (1, 6)]);
        assert!(braces.unclosed.is_empty());
        assert!(braces.unopened.is_empty());
    }

    #[test]
    fn reports_unbalanced() {
        let braces = scan("}a{", CSS);
        assert_eq!(braces.unopened, vec![0]);
        assert_eq!(braces.unclosed, vec![2]);
    }

    #[test]
    fn ignores_strings_and_comments() {
        let braces = scan("a { content: \"}\"; /* { */ }", CSS);
        assert_eq!(braces.pairs.len(), 1);
        assert_eq!(braces.comments.len(), 1);

        let braces = scan("let s = `{${x}`; // }\n{}", JS);
        assert_eq!(braces.pairs.len(), 1);
        assert!(braces.unopened.is_empty());
        assert!(braces.in_comment(18));
    }

    #[test]
    fn line_comments_only_where_enabled() {
        let braces = scan("a { background: url(//x) }", CSS);
        assert_eq!(braces.pairs.len(), 1);
        assert!(braces.comments.is_empty());
    }
}
