//! Go-to-definition and references.
//!
//! Definitions come from the mode at the cursor. When it has none, the word
//! under the cursor is looked up among the symbols of every region. A
//! template `ref="name"` attribute wins over definitions that only point
//! into `node_modules`, which is where `this.$refs` members resolve.

use std::sync::LazyLock;

use regex::Regex;
use tower_lsp::lsp_types::{Location, Position};

use crate::document::TextDocument;
use crate::modes::LanguageModes;

use super::symbols::{collect_symbols, find_symbol};
use super::words::word_at_position;

static REF_ATTRIBUTE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bref=['"](\w+)['"]"#).expect("valid ref attribute regex"));

const DEPENDENCY_DIR: &str = "node_modules";

pub fn definition_at_position(
    modes: &LanguageModes,
    document: &TextDocument,
    position: Position,
) -> Vec<Location> {
    let mut definitions = modes
        .mode_at_position(document, position)
        .map(|mode| mode.find_definition(document, position))
        .unwrap_or_default();

    if definitions.is_empty() {
        let symbols = collect_symbols(modes, document);
        if let Some(symbol) = find_symbol(&symbols, document, position) {
            return vec![symbol.location.clone()];
        }
    }

    if definitions
        .iter()
        .any(|d| !d.uri.as_str().contains(DEPENDENCY_DIR))
    {
        return definitions;
    }

    let word = word_at_position(document, position);
    if let Some(reference) = collect_refs(document).into_iter().find(|r| r.name == word) {
        log::debug!("definition of {} resolved to template ref", word);
        if !definitions.is_empty() {
            definitions.remove(0);
        }
        definitions.insert(0, reference.location);
    }
    definitions
}

pub fn references_at_position(
    modes: &LanguageModes,
    document: &TextDocument,
    position: Position,
) -> Vec<Location> {
    modes
        .mode_at_position(document, position)
        .map(|mode| mode.find_references(document, position))
        .unwrap_or_default()
}

/// A `ref="name"` attribute in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRef {
    pub name: String,
    /// Location of the name inside the quotes.
    pub location: Location,
}

pub fn collect_refs(document: &TextDocument) -> Vec<TemplateRef> {
    REF_ATTRIBUTE_PATTERN
        .captures_iter(document.text())
        .filter_map(|caps| caps.get(1))
        .map(|name| TemplateRef {
            name: name.as_str().to_string(),
            location: Location {
                uri: document.uri().clone(),
                range: document.span_to_range(&name.range()),
            },
        })
        .collect()
}
