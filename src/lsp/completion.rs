//! Completion routed to the mode at the cursor, with `this.` member
//! completion drawn from symbols of every region.

use std::collections::HashSet;

use tower_lsp::lsp_types::*;

use crate::document::TextDocument;
use crate::modes::LanguageModes;

use super::symbols::collect_symbols;
use super::words::previous_words;

/// Sort text that places symbol members ahead of the mode's own items.
const MEMBER_SORT_TEXT: &str = "1222";

pub fn completion_at_position(
    modes: &LanguageModes,
    document: &TextDocument,
    position: Position,
    this_completion: bool,
) -> Option<CompletionResponse> {
    let mode = modes.mode_at_position(document, position)?;
    let list = mode.do_complete(document, position);
    log::debug!(
        "completion at {}:{}:{} by {} -> {} items",
        document.uri(),
        position.line,
        position.character,
        mode.id(),
        list.as_ref().map_or(0, |l| l.items.len())
    );

    if !this_completion {
        return list.map(CompletionResponse::List);
    }

    let is_incomplete = list.as_ref().is_some_and(|l| l.is_incomplete);
    let items = list.map(|l| l.items).unwrap_or_default();
    let items = complete_this_members(items, modes, document, position);
    if items.is_empty() {
        return None;
    }
    Some(CompletionResponse::List(CompletionList {
        is_incomplete,
        items,
    }))
}

/// After `this.`, offer every identifier-like symbol of the document first.
///
/// Mode items whose label matches a symbol are dropped; the rest follow.
pub fn complete_this_members(
    items: Vec<CompletionItem>,
    modes: &LanguageModes,
    document: &TextDocument,
    position: Position,
) -> Vec<CompletionItem> {
    if !previous_words(document, position).iter().any(|w| w == "this") {
        return items;
    }

    let mut seen = HashSet::new();
    let mut members: Vec<CompletionItem> = collect_symbols(modes, document)
        .into_iter()
        .filter(|symbol| is_identifier(&symbol.name))
        .filter(|symbol| seen.insert(symbol.name.clone()))
        .map(|symbol| CompletionItem {
            label: symbol.name,
            kind: Some(CompletionItemKind::METHOD),
            sort_text: Some(MEMBER_SORT_TEXT.to_string()),
            ..Default::default()
        })
        .collect();

    members.extend(items.into_iter().filter(|item| !seen.contains(&item.label)));
    members
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
