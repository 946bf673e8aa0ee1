//! Folding ranges and formatting.

use tower_lsp::lsp_types::{FoldingRange, FormattingOptions, Range, TextEdit};

use crate::document::TextDocument;
use crate::modes::LanguageModes;

pub fn folding_ranges(modes: &LanguageModes, document: &TextDocument) -> Vec<FoldingRange> {
    let mut ranges: Vec<FoldingRange> = modes
        .modes_in_document(document)
        .iter()
        .flat_map(|mode| mode.get_folding_ranges(document))
        .collect();
    ranges.sort_by_key(|r| (r.start_line, r.end_line));
    ranges
}

/// Format each region with its mode, restricted to `range` when given.
pub fn format_document(
    modes: &LanguageModes,
    document: &TextDocument,
    range: Option<Range>,
    options: &FormattingOptions,
) -> Vec<TextEdit> {
    modes
        .mode_ranges_in_document(document)
        .into_iter()
        .filter_map(|mode_range| {
            let region = match range {
                Some(limit) => intersect(mode_range.range, limit)?,
                None => mode_range.range,
            };
            Some(mode_range.mode.format(document, region, options))
        })
        .flatten()
        .collect()
}

fn intersect(a: Range, b: Range) -> Option<Range> {
    let start = a.start.max(b.start);
    let end = a.end.min(b.end);
    (start <= end).then(|| Range::new(start, end))
}
