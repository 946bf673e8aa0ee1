//! Document symbols gathered across every region.

use tower_lsp::lsp_types::{Position, SymbolInformation};

use crate::document::TextDocument;
use crate::modes::LanguageModes;

use super::words::word_at_position;

/// Symbols of every mode present in the document, in region order.
pub fn collect_symbols(modes: &LanguageModes, document: &TextDocument) -> Vec<SymbolInformation> {
    modes
        .modes_in_document(document)
        .iter()
        .flat_map(|mode| mode.find_document_symbols(document))
        .collect()
}

/// The first symbol named like the word under the cursor.
pub fn find_symbol<'a>(
    symbols: &'a [SymbolInformation],
    document: &TextDocument,
    position: Position,
) -> Option<&'a SymbolInformation> {
    let word = word_at_position(document, position);
    if word.is_empty() {
        return None;
    }
    symbols.iter().find(|symbol| symbol.name == word)
}
