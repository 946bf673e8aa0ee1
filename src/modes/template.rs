//! HTML templates: tag completion, tag hover, element folding and
//! highlighting of matching tags.

use std::ops::Range as Span;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tower_lsp::lsp_types::*;

use crate::document::{DocumentRegions, LanguageModelCache, TextDocument};
use crate::settings::CacheSettings;

use super::{embedded_documents, LanguageMode};

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<(/?)([A-Za-z][\w.:-]*)(?:"[^"]*"|'[^']*'|[^'">])*?(/?)>"#)
        .expect("valid tag regex")
});

static OPEN_TAG_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(/?)([A-Za-z][\w.:-]*)?$").expect("valid tag prefix regex"));

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const HTML_TAGS: &[(&str, &str)] = &[
    ("a", "A hyperlink to another resource."),
    ("button", "A clickable button."),
    ("div", "A generic flow container."),
    ("form", "A section containing interactive controls for submitting data."),
    ("h1", "A top-level section heading."),
    ("h2", "A second-level section heading."),
    ("h3", "A third-level section heading."),
    ("img", "An embedded image."),
    ("input", "An interactive control accepting user data."),
    ("label", "A caption for a form control."),
    ("li", "An item in a list."),
    ("ol", "An ordered list."),
    ("option", "An item in a select or datalist."),
    ("p", "A paragraph."),
    ("select", "A control offering a menu of options."),
    ("slot", "A placeholder filled by content passed to the component."),
    ("span", "A generic inline container."),
    ("table", "Tabular data."),
    ("td", "A data cell of a table."),
    ("template", "Content that is not rendered immediately."),
    ("textarea", "A multi-line text control."),
    ("th", "A header cell of a table."),
    ("tr", "A row of table cells."),
    ("transition", "Applies enter and leave transitions to its child."),
    ("ul", "An unordered list."),
];

#[derive(Debug, Clone, PartialEq)]
struct Element {
    name: String,
    open: Span<usize>,
    /// Closing tag, when present.
    close: Option<Span<usize>>,
    /// Self-closing or void, so it never contains anything.
    empty: bool,
}

/// Elements of a template in order of their opening tags.
#[derive(Debug, Default)]
struct Elements {
    elements: Vec<Element>,
}

impl Elements {
    fn parse(text: &str) -> Self {
        let mut elements: Vec<Element> = Vec::new();
        let mut open: Vec<usize> = Vec::new();
        let comments = comment_spans(text);
        let mut comments = comments.iter().peekable();

        for caps in TAG_PATTERN.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let start = whole.start();
            while comments.next_if(|c| c.end <= start).is_some() {}
            if comments.peek().is_some_and(|c| c.start <= start) {
                continue;
            }
            let name = name.as_str();
            let closing = caps.get(1).is_some_and(|m| !m.is_empty());
            let self_closing = caps.get(3).is_some_and(|m| !m.is_empty());

            if closing {
                // Close the innermost matching element; unmatched ones stay open.
                if let Some(depth) = open.iter().rposition(|&i| elements[i].name == name) {
                    let index = open[depth];
                    elements[index].close = Some(whole.range());
                    open.truncate(depth);
                }
                continue;
            }

            let empty =
                self_closing || VOID_ELEMENTS.contains(&name.to_ascii_lowercase().as_str());
            elements.push(Element {
                name: name.to_string(),
                open: whole.range(),
                close: None,
                empty,
            });
            if !empty {
                open.push(elements.len() - 1);
            }
        }

        Self { elements }
    }

    /// Innermost element left open before `offset`.
    fn unclosed_before(&self, offset: usize) -> Option<&Element> {
        self.elements
            .iter()
            .filter(|e| !e.empty && e.open.end <= offset)
            .filter(|e| e.close.as_ref().map_or(true, |c| c.start >= offset))
            .last()
    }

    /// The element whose opening or closing tag name covers `offset`.
    fn at_tag_name(&self, offset: usize) -> Option<&Element> {
        self.elements
            .iter()
            .find(|e| e.tag_name_spans().any(|span| span.contains(&offset)))
    }
}

impl Element {
    /// Name spans of the opening tag and of the closing tag, if any.
    fn tag_name_spans(&self) -> impl Iterator<Item = Span<usize>> + '_ {
        let len = self.name.len();
        let close = self.close.as_ref().map(|c| c.start + 2);
        std::iter::once(self.open.start + 1)
            .chain(close)
            .map(move |start| start..start + len)
    }
}

/// Spans of `<!-- -->` comments, in order. An unterminated comment runs to the end.
fn comment_spans(text: &str) -> Vec<Span<usize>> {
    let mut spans = Vec::new();
    let mut pos = 0;
    while let Some(rel) = text[pos..].find("<!--") {
        let start = pos + rel;
        let end = text[start + 4..]
            .find("-->")
            .map_or(text.len(), |i| start + 4 + i + 3);
        spans.push(start..end);
        pos = end;
    }
    spans
}

pub struct TemplateMode {
    id: String,
    embedded: LanguageModelCache<TextDocument>,
    elements: LanguageModelCache<Elements>,
}

impl TemplateMode {
    pub fn new(
        language_id: &str,
        regions: &Arc<LanguageModelCache<DocumentRegions>>,
        cache: &CacheSettings,
    ) -> Self {
        Self {
            id: language_id.to_string(),
            embedded: embedded_documents(language_id, regions, cache),
            elements: LanguageModelCache::new(cache.max_entries, cache.max_age(), |d| {
                Elements::parse(d.text())
            }),
        }
    }

    fn analyze(&self, document: &TextDocument) -> (Arc<TextDocument>, Arc<Elements>) {
        let embedded = self.embedded.refresh_and_get(document);
        let elements = self.elements.refresh_and_get(&embedded);
        (embedded, elements)
    }
}

impl LanguageMode for TemplateMode {
    fn id(&self) -> &str {
        &self.id
    }

    fn do_complete(&self, document: &TextDocument, position: Position) -> Option<CompletionList> {
        let (embedded, elements) = self.analyze(document);
        let prefix = embedded.line_prefix(position);
        let caps = OPEN_TAG_PREFIX.captures(prefix)?;
        let closing = caps.get(1).is_some_and(|m| !m.is_empty());
        let typed = caps.get(2).map_or("", |m| m.as_str());

        let offset = embedded.offset_at(position);
        let range = embedded.span_to_range(&(offset - typed.len()..offset));
        let item = |label: String, kind, detail: Option<&str>| CompletionItem {
            text_edit: Some(CompletionTextEdit::Edit(TextEdit {
                range,
                new_text: label.clone(),
            })),
            label,
            kind: Some(kind),
            documentation: detail.map(|d| Documentation::String(d.to_string())),
            ..Default::default()
        };

        let items = if closing {
            let element = elements.unclosed_before(offset - typed.len())?;
            vec![item(
                format!("{}>", element.name),
                CompletionItemKind::PROPERTY,
                None,
            )]
        } else {
            HTML_TAGS
                .iter()
                .filter(|(name, _)| name.starts_with(typed))
                .map(|(name, description)| {
                    item(name.to_string(), CompletionItemKind::PROPERTY, Some(*description))
                })
                .collect()
        };

        Some(CompletionList {
            is_incomplete: false,
            items,
        })
    }

    fn do_hover(&self, document: &TextDocument, position: Position) -> Option<Hover> {
        let (embedded, elements) = self.analyze(document);
        let offset = embedded.offset_at(position);
        let element = elements.at_tag_name(offset)?;
        let span = element.tag_name_spans().find(|span| span.contains(&offset))?;
        let (_, description) = HTML_TAGS.iter().find(|(name, _)| *name == element.name)?;
        Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: format!("`<{}>`\n\n{}", element.name, description),
            }),
            range: Some(embedded.span_to_range(&span)),
        })
    }

    fn find_document_highlight(
        &self,
        document: &TextDocument,
        position: Position,
    ) -> Vec<DocumentHighlight> {
        let (embedded, elements) = self.analyze(document);
        let Some(element) = elements.at_tag_name(embedded.offset_at(position)) else {
            return Vec::new();
        };
        element
            .tag_name_spans()
            .map(|span| DocumentHighlight {
                range: embedded.span_to_range(&span),
                kind: Some(DocumentHighlightKind::READ),
            })
            .collect()
    }

    fn get_folding_ranges(&self, document: &TextDocument) -> Vec<FoldingRange> {
        let (embedded, elements) = self.analyze(document);
        elements
            .elements
            .iter()
            .filter_map(|e| {
                let close = e.close.as_ref()?;
                let start_line = embedded.position_at(e.open.start).line;
                let end_line = embedded.position_at(close.start).line.checked_sub(1)?;
                (end_line > start_line).then(|| FoldingRange {
                    start_line,
                    start_character: None,
                    end_line,
                    end_character: None,
                    kind: None,
                    collapsed_text: None,
                })
            })
            .collect()
    }

    fn on_document_removed(&self, uri: &Url) {
        self.embedded.on_document_removed(uri);
        self.elements.on_document_removed(uri);
    }

    fn dispose(&self) {
        self.embedded.dispose();
        self.elements.dispose();
    }
}
