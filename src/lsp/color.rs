//! Document colors and their presentations.

use tower_lsp::lsp_types::{Color, ColorInformation, ColorPresentation, Range};

use crate::document::TextDocument;
use crate::modes::LanguageModes;

pub fn document_colors(modes: &LanguageModes, document: &TextDocument) -> Vec<ColorInformation> {
    modes
        .modes_in_document(document)
        .iter()
        .flat_map(|mode| mode.find_document_colors(document))
        .collect()
}

/// Presentations come from the mode owning the start of `range`.
pub fn color_presentations(
    modes: &LanguageModes,
    document: &TextDocument,
    color: Color,
    range: Range,
) -> Vec<ColorPresentation> {
    modes
        .mode_at_position(document, range.start)
        .map(|mode| mode.get_color_presentations(document, color, range))
        .unwrap_or_default()
}
