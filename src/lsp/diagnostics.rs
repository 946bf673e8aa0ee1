//! Validation across every region of a document.

use tower_lsp::lsp_types::Diagnostic;

use crate::document::TextDocument;
use crate::modes::LanguageModes;

/// Diagnostics of every mode present in the document, in region order.
pub fn validate_document(modes: &LanguageModes, document: &TextDocument) -> Vec<Diagnostic> {
    let diagnostics: Vec<Diagnostic> = modes
        .modes_in_document(document)
        .iter()
        .flat_map(|mode| mode.do_validation(document))
        .collect();
    log::debug!(
        "{} diagnostics for {} v{}",
        diagnostics.len(),
        document.uri(),
        document.version()
    );
    diagnostics
}
