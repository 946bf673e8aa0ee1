//! Stylus, the indentation-based stylesheet syntax.
//!
//! Blocks are delimited by indentation, braces are optional. An outline scan
//! of the single-language view yields selector, mixin, at-rule and variable
//! symbols plus indentation folds; completion and hover cover properties and
//! at-rules.

use std::ops::Range as Span;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tower_lsp::lsp_types::*;

use crate::document::{DocumentRegions, LanguageModelCache, TextDocument};
use crate::settings::CacheSettings;

use super::style::AT_RULES;
use super::{embedded_documents, symbol, LanguageMode};

/// `name = value`, also `?=` and `:=`.
static VARIABLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\$?[A-Za-z_][\w-]*)\s*[?:]?=[^=]").expect("valid variable regex")
});

/// `name(args)` opening a block defines a mixin or function.
static MIXIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_-][\w-]*)\([^)]*\)\s*\{?$").expect("valid mixin regex")
});

const STYLUS_AT_RULES: &[(&str, &str)] = &[
    ("@block", "Assigns a block of properties to a variable."),
    ("@css", "Passes the enclosed text through as plain CSS."),
    ("@extend", "Inherits the styles of another selector."),
    ("@require", "Imports a file once, however often it is required."),
];

const PROPERTIES: &[(&str, &str)] = &[
    ("align-items", "Aligns flex or grid items on the cross axis."),
    ("background", "Shorthand for the background properties."),
    ("background-color", "Background color of an element."),
    ("border", "Shorthand for border width, style and color."),
    ("border-radius", "Rounds the corners of the border."),
    ("box-sizing", "How width and height are computed."),
    ("color", "Foreground color of text."),
    ("cursor", "Mouse cursor shown over the element."),
    ("display", "Display type of the element."),
    ("flex", "Shorthand for flex grow, shrink and basis."),
    ("flex-direction", "Main axis of a flex container."),
    ("font-family", "Prioritized list of font families."),
    ("font-size", "Size of the font."),
    ("font-weight", "Weight of the font."),
    ("height", "Height of the content area."),
    ("justify-content", "Distributes items along the main axis."),
    ("line-height", "Height of a line box."),
    ("margin", "Shorthand for the margins on all four sides."),
    ("opacity", "Transparency of the element."),
    ("overflow", "What happens to content that overflows the box."),
    ("padding", "Shorthand for the padding on all four sides."),
    ("position", "Positioning scheme of the element."),
    ("text-align", "Horizontal alignment of inline content."),
    ("transition", "Shorthand for the transition properties."),
    ("width", "Width of the content area."),
    ("z-index", "Stack order of a positioned element."),
];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '$' | '@')
}

#[derive(Debug, Clone, PartialEq)]
struct OutlineItem {
    name: String,
    kind: SymbolKind,
    span: Span<usize>,
}

/// A significant line: comments stripped, blank lines dropped.
#[derive(Debug)]
struct Line<'a> {
    indent: usize,
    /// Byte span of the trimmed content.
    span: Span<usize>,
    text: &'a str,
}

#[derive(Debug, Default)]
struct Outline {
    items: Vec<OutlineItem>,
    /// Lines that open an indented block, to the end of the block.
    blocks: Vec<Span<usize>>,
}

impl Outline {
    fn parse(text: &str) -> Self {
        let lines = significant_lines(text);
        let mut outline = Self::default();
        // selector lines ending with `,` continue on the next line
        let mut pending: Option<(usize, Vec<&str>)> = None;

        for (i, line) in lines.iter().enumerate() {
            let block_end = lines[i + 1..]
                .iter()
                .take_while(|next| next.indent > line.indent)
                .last()
                .map(|last| last.span.end);
            let content = line.text.trim_end_matches('{').trim_end();

            if let Some(caps) = VARIABLE_PATTERN.captures(line.text) {
                pending = None;
                outline.items.push(OutlineItem {
                    name: caps[1].to_string(),
                    kind: SymbolKind::VARIABLE,
                    span: line.span.clone(),
                });
                continue;
            }

            let Some(end) = block_end else {
                if content.ends_with(',') && !content.contains(':') {
                    match &mut pending {
                        Some((_, parts)) => parts.push(content),
                        None => pending = Some((line.span.start, vec![content])),
                    }
                } else {
                    pending = None;
                }
                continue;
            };
            outline.blocks.push(line.span.start..end);

            let (kind, name, start) = if content.starts_with('@') {
                (SymbolKind::MODULE, content.to_string(), line.span.start)
            } else if let Some(caps) = MIXIN_PATTERN.captures(line.text) {
                (SymbolKind::FUNCTION, caps[1].to_string(), line.span.start)
            } else {
                match pending.take() {
                    Some((start, mut parts)) => {
                        parts.push(content);
                        (SymbolKind::CLASS, parts.join(" "), start)
                    }
                    None => (SymbolKind::CLASS, content.to_string(), line.span.start),
                }
            };
            pending = None;
            outline.items.push(OutlineItem {
                name,
                kind,
                span: start..end,
            });
        }

        outline
    }
}

fn significant_lines(text: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut in_block_comment = false;
    let mut offset = 0;

    for raw in text.split_inclusive('\n') {
        let start = offset;
        offset += raw.len();
        let mut body = raw.trim_end_matches(['\n', '\r']);

        if in_block_comment {
            // the rest of a closing comment line is dropped
            in_block_comment = !body.contains("*/");
            continue;
        }
        if let Some(comment) = body.find("/*") {
            if !body[comment..].contains("*/") {
                in_block_comment = true;
            }
            body = &body[..comment];
        }
        if let Some(comment) = line_comment_start(body) {
            body = &body[..comment];
        }

        let content = body.trim();
        if content.is_empty() {
            continue;
        }
        let indent = body.len() - body.trim_start().len();
        lines.push(Line {
            indent,
            span: start + indent..start + indent + content.len(),
            text: content,
        });
    }
    lines
}

/// `//` outside of a `url(...)`-style `://`.
fn line_comment_start(body: &str) -> Option<usize> {
    body.match_indices("//")
        .map(|(i, _)| i)
        .find(|&i| i == 0 || body.as_bytes()[i - 1] != b':')
}

pub struct StylusMode {
    embedded: LanguageModelCache<TextDocument>,
    outlines: LanguageModelCache<Outline>,
}

impl StylusMode {
    pub fn new(regions: &Arc<LanguageModelCache<DocumentRegions>>, cache: &CacheSettings) -> Self {
        Self {
            embedded: embedded_documents("stylus", regions, cache),
            outlines: LanguageModelCache::new(cache.max_entries, cache.max_age(), |d| {
                Outline::parse(d.text())
            }),
        }
    }

    fn analyze(&self, document: &TextDocument) -> (Arc<TextDocument>, Arc<Outline>) {
        let embedded = self.embedded.refresh_and_get(document);
        let outline = self.outlines.refresh_and_get(&embedded);
        (embedded, outline)
    }

    fn at_rules() -> impl Iterator<Item = &'static (&'static str, &'static str)> {
        AT_RULES.iter().chain(STYLUS_AT_RULES)
    }
}

/// Whether the word starting at `start` is the first thing on an indented line.
fn in_property_position(embedded: &TextDocument, start: usize) -> bool {
    let head = &embedded.text()[..start];
    let line = &head[head.rfind('\n').map_or(0, |p| p + 1)..];
    !line.is_empty() && line.trim().is_empty()
}

impl LanguageMode for StylusMode {
    fn id(&self) -> &str {
        "stylus"
    }

    fn do_complete(&self, document: &TextDocument, position: Position) -> Option<CompletionList> {
        let (embedded, outline) = self.analyze(document);
        let offset = embedded.offset_at(position);
        let span = embedded.word_span_at(offset, is_word_char);
        let typed = &embedded.text()[span.start..offset];
        let range = embedded.span_to_range(&span);
        let item = |label: &str, kind, insert: String, detail: Option<&str>| CompletionItem {
            label: label.to_string(),
            kind: Some(kind),
            sort_text: Some(format!("1{label}")),
            documentation: detail.map(|d| Documentation::String(d.to_string())),
            text_edit: Some(CompletionTextEdit::Edit(TextEdit {
                range,
                new_text: insert,
            })),
            ..Default::default()
        };

        let items: Vec<CompletionItem> = if typed.starts_with('@') {
            Self::at_rules()
                .filter(|(name, _)| name.starts_with(typed))
                .map(|(name, description)| {
                    item(name, CompletionItemKind::KEYWORD, name.to_string(), Some(*description))
                })
                .collect()
        } else if in_property_position(&embedded, span.start) {
            PROPERTIES
                .iter()
                .filter(|(name, _)| name.starts_with(typed))
                .map(|(name, description)| {
                    item(
                        name,
                        CompletionItemKind::PROPERTY,
                        format!("{name}: "),
                        Some(*description),
                    )
                })
                .collect()
        } else {
            outline
                .items
                .iter()
                .filter(|i| i.kind == SymbolKind::VARIABLE && i.name.starts_with(typed))
                .map(|i| item(&i.name, CompletionItemKind::VARIABLE, i.name.clone(), None))
                .collect()
        };

        Some(CompletionList {
            is_incomplete: false,
            items,
        })
    }

    fn do_hover(&self, document: &TextDocument, position: Position) -> Option<Hover> {
        let embedded = self.embedded.refresh_and_get(document);
        let span = embedded.word_span_at(embedded.offset_at(position), is_word_char);
        let word = &embedded.text()[span.clone()];
        let (name, description) = if word.starts_with('@') {
            Self::at_rules().find(|(name, _)| *name == word)?
        } else if in_property_position(&embedded, span.start) {
            PROPERTIES.iter().find(|(name, _)| *name == word)?
        } else {
            return None;
        };
        Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: format!("**{name}**\n\n{description}"),
            }),
            range: Some(embedded.span_to_range(&span)),
        })
    }

    fn find_document_symbols(&self, document: &TextDocument) -> Vec<SymbolInformation> {
        let (embedded, outline) = self.analyze(document);
        outline
            .items
            .iter()
            .map(|item| symbol(&item.name, item.kind, &embedded, &item.span))
            .collect()
    }

    fn get_folding_ranges(&self, document: &TextDocument) -> Vec<FoldingRange> {
        let (embedded, outline) = self.analyze(document);
        outline
            .blocks
            .iter()
            .filter_map(|block| {
                let start = embedded.position_at(block.start).line;
                let end = embedded.position_at(block.end).line;
                (end > start).then_some(FoldingRange {
                    start_line: start,
                    start_character: None,
                    end_line: end,
                    end_character: None,
                    kind: None,
                    collapsed_text: None,
                })
            })
            .collect()
    }

    fn on_document_removed(&self, uri: &Url) {
        self.embedded.on_document_removed(uri);
        self.outlines.on_document_removed(uri);
    }

    fn dispose(&self) {
        self.embedded.dispose();
        self.outlines.dispose();
    }
}
