//! Hover and document highlights, answered by the mode at the cursor.

use tower_lsp::lsp_types::{DocumentHighlight, Hover, Position};

use crate::document::TextDocument;
use crate::modes::LanguageModes;

pub fn hover_at_position(
    modes: &LanguageModes,
    document: &TextDocument,
    position: Position,
) -> Option<Hover> {
    modes
        .mode_at_position(document, position)?
        .do_hover(document, position)
}

pub fn highlights_at_position(
    modes: &LanguageModes,
    document: &TextDocument,
    position: Position,
) -> Vec<DocumentHighlight> {
    modes
        .mode_at_position(document, position)
        .map(|mode| mode.find_document_highlight(document, position))
        .unwrap_or_default()
}
