//! JavaScript and TypeScript: declaration symbols, name-based definition
//! and references, and brace folding.
//!
//! There is no type checker here; declarations are recognised lexically on
//! the masked script view.

use std::ops::Range as Span;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tower_lsp::lsp_types::*;

use crate::document::{DocumentRegions, LanguageModelCache, TextDocument};
use crate::settings::CacheSettings;

use super::braces::{self, Braces, Syntax};
use super::{embedded_documents, symbol, LanguageMode};

const SYNTAX: Syntax = Syntax {
    line_comments: true,
    backtick_strings: true,
};

static DECLARATION_PATTERNS: LazyLock<Vec<(Regex, SymbolKind)>> = LazyLock::new(|| {
    [
        (r"\bfunction\s*\*?\s*([A-Za-z_$][\w$]*)", SymbolKind::FUNCTION),
        (r"\bclass\s+([A-Za-z_$][\w$]*)", SymbolKind::CLASS),
        (r"\binterface\s+([A-Za-z_$][\w$]*)", SymbolKind::INTERFACE),
        (r"\benum\s+([A-Za-z_$][\w$]*)", SymbolKind::ENUM),
        (r"\btype\s+([A-Za-z_$][\w$]*)\s*(?:<[^>]*>)?\s*=", SymbolKind::TYPE_PARAMETER),
        (r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)", SymbolKind::VARIABLE),
        (
            r"(?m)^[ \t]*(?:async\s+)?([A-Za-z_$][\w$]*)\s*\([^()\n]*\)\s*\{",
            SymbolKind::METHOD,
        ),
    ]
    .into_iter()
    .map(|(pattern, kind)| (Regex::new(pattern).expect("valid declaration regex"), kind))
    .collect()
});

/// Keywords that look like method heads: `if (x) {`.
const CONTROL_KEYWORDS: &[&str] = &["if", "for", "while", "switch", "catch", "function", "return"];

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[derive(Debug, Clone, PartialEq)]
struct Declaration {
    name: String,
    kind: SymbolKind,
    /// Span of the name.
    span: Span<usize>,
}

#[derive(Debug)]
struct Script {
    braces: Braces,
    declarations: Vec<Declaration>,
}

impl Script {
    fn parse(text: &str) -> Self {
        let braces = braces::scan(text, SYNTAX);
        let mut declarations: Vec<Declaration> = Vec::new();
        for (pattern, kind) in DECLARATION_PATTERNS.iter() {
            for caps in pattern.captures_iter(text) {
                let Some(name) = caps.get(1) else { continue };
                if braces.in_comment(name.start())
                    || CONTROL_KEYWORDS.contains(&name.as_str())
                    || declarations.iter().any(|d| d.span == name.range())
                {
                    continue;
                }
                declarations.push(Declaration {
                    name: name.as_str().to_string(),
                    kind: *kind,
                    span: name.range(),
                });
            }
        }
        declarations.sort_by_key(|d| d.span.start);
        Self {
            braces,
            declarations,
        }
    }
}

pub struct ScriptMode {
    id: String,
    embedded: LanguageModelCache<TextDocument>,
    scripts: LanguageModelCache<Script>,
}

impl ScriptMode {
    pub fn new(
        language_id: &str,
        regions: &Arc<LanguageModelCache<DocumentRegions>>,
        cache: &CacheSettings,
    ) -> Self {
        Self {
            id: language_id.to_string(),
            embedded: embedded_documents(language_id, regions, cache),
            scripts: LanguageModelCache::new(cache.max_entries, cache.max_age(), |d| {
                Script::parse(d.text())
            }),
        }
    }

    fn analyze(&self, document: &TextDocument) -> (Arc<TextDocument>, Arc<Script>) {
        let embedded = self.embedded.refresh_and_get(document);
        let script = self.scripts.refresh_and_get(&embedded);
        (embedded, script)
    }

    /// Spans of every whole-word occurrence of the identifier at `position`.
    fn occurrences(&self, document: &TextDocument, position: Position) -> Option<(String, Vec<Span<usize>>)> {
        let (embedded, script) = self.analyze(document);
        let span = embedded.word_span_at(embedded.offset_at(position), is_identifier_char);
        if span.is_empty() {
            return None;
        }
        let word = embedded.text()[span].to_string();
        let spans = embedded
            .text()
            .match_indices(word.as_str())
            .map(|(start, _)| start..start + word.len())
            .filter(|s| embedded.word_span_at(s.start, is_identifier_char) == *s)
            .filter(|s| !script.braces.in_comment(s.start))
            .collect();
        Some((word, spans))
    }
}

impl LanguageMode for ScriptMode {
    fn id(&self) -> &str {
        &self.id
    }

    fn find_document_highlight(
        &self,
        document: &TextDocument,
        position: Position,
    ) -> Vec<DocumentHighlight> {
        let Some((_, spans)) = self.occurrences(document, position) else {
            return Vec::new();
        };
        spans
            .into_iter()
            .map(|span| DocumentHighlight {
                range: document.span_to_range(&span),
                kind: Some(DocumentHighlightKind::TEXT),
            })
            .collect()
    }

    fn find_document_symbols(&self, document: &TextDocument) -> Vec<SymbolInformation> {
        let (embedded, script) = self.analyze(document);
        script
            .declarations
            .iter()
            .map(|d| symbol(&d.name, d.kind, &embedded, &d.span))
            .collect()
    }

    fn find_definition(&self, document: &TextDocument, position: Position) -> Vec<Location> {
        let (embedded, script) = self.analyze(document);
        let span = embedded.word_span_at(embedded.offset_at(position), is_identifier_char);
        let word = &embedded.text()[span];
        script
            .declarations
            .iter()
            .find(|d| d.name == word)
            .map(|d| Location {
                uri: document.uri().clone(),
                range: document.span_to_range(&d.span),
            })
            .into_iter()
            .collect()
    }

    fn find_references(&self, document: &TextDocument, position: Position) -> Vec<Location> {
        let Some((_, spans)) = self.occurrences(document, position) else {
            return Vec::new();
        };
        spans
            .into_iter()
            .map(|span| Location {
                uri: document.uri().clone(),
                range: document.span_to_range(&span),
            })
            .collect()
    }

    fn get_folding_ranges(&self, document: &TextDocument) -> Vec<FoldingRange> {
        let (embedded, script) = self.analyze(document);
        braces::folding_ranges(&embedded, &script.braces)
    }

    fn on_document_removed(&self, uri: &Url) {
        self.embedded.on_document_removed(uri);
        self.scripts.on_document_removed(uri);
    }

    fn dispose(&self) {
        self.embedded.dispose();
        self.scripts.dispose();
    }
}
