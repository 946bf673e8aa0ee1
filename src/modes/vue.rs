//! The outer mode: scaffolding snippets for top-level blocks.

use tower_lsp::lsp_types::*;

use crate::document::TextDocument;

use super::LanguageMode;

/// A scaffold snippet offered at top level.
struct Scaffold {
    label: &'static str,
    detail: &'static str,
    body: &'static str,
    /// Orders file templates before blocks, blocks by kind.
    sort_prefix: char,
}

const SCAFFOLDS: &[Scaffold] = &[
    Scaffold {
        label: "<vue> with default.vue",
        detail: "Component file with template, script and style",
        body: "<template>\n  $0\n</template>\n\n<script>\nexport default {\n\n}\n</script>\n\n<style>\n\n</style>\n",
        sort_prefix: '0',
    },
    Scaffold {
        label: "<template> html",
        detail: "Template block",
        body: "<template>\n  $0\n</template>\n",
        sort_prefix: '1',
    },
    Scaffold {
        label: "<template> pug",
        detail: "Template block with pug",
        body: "<template lang=\"pug\">\n  $0\n</template>\n",
        sort_prefix: '1',
    },
    Scaffold {
        label: "<script> js",
        detail: "Script block",
        body: "<script>\nexport default {\n  $0\n}\n</script>\n",
        sort_prefix: '2',
    },
    Scaffold {
        label: "<script> ts",
        detail: "Script block with typescript",
        body: "<script lang=\"ts\">\nexport default {\n  $0\n}\n</script>\n",
        sort_prefix: '2',
    },
    Scaffold {
        label: "<style> css",
        detail: "Style block",
        body: "<style>\n$0\n</style>\n",
        sort_prefix: '3',
    },
    Scaffold {
        label: "<style> css scoped",
        detail: "Scoped style block",
        body: "<style scoped>\n$0\n</style>\n",
        sort_prefix: '3',
    },
    Scaffold {
        label: "<style> scss",
        detail: "Style block with scss",
        body: "<style lang=\"scss\">\n$0\n</style>\n",
        sort_prefix: '3',
    },
    Scaffold {
        label: "<style> less",
        detail: "Style block with less",
        body: "<style lang=\"less\">\n$0\n</style>\n",
        sort_prefix: '3',
    },
];

const STYLE_LANGUAGES: &[&str] = &["less", "scss", "sass"];

pub struct VueMode {
    id: String,
    scaffold_snippets: bool,
}

impl VueMode {
    pub fn new(id: &str, scaffold_snippets: bool) -> Self {
        Self {
            id: id.to_string(),
            scaffold_snippets,
        }
    }
}

impl LanguageMode for VueMode {
    fn id(&self) -> &str {
        &self.id
    }

    fn do_complete(&self, document: &TextDocument, position: Position) -> Option<CompletionList> {
        if !self.scaffold_snippets {
            return Some(CompletionList::default());
        }

        let line = document.line_prefix(position);
        let items = if line.starts_with('<') && line.contains("style") {
            style_attribute_items(line)
        } else if line.starts_with('<') {
            // Replace the partially typed tag with the snippet.
            let end = document.offset_at(position);
            let range = document.span_to_range(&(end - line.len()..end));
            scaffold_items(Some(range))
        } else {
            scaffold_items(None)
        };

        Some(CompletionList {
            is_incomplete: false,
            items,
        })
    }
}

fn scaffold_items(replace: Option<Range>) -> Vec<CompletionItem> {
    SCAFFOLDS
        .iter()
        .map(|scaffold| CompletionItem {
            label: scaffold.label.to_string(),
            kind: Some(CompletionItemKind::SNIPPET),
            detail: Some(scaffold.detail.to_string()),
            sort_text: Some(format!("{}{}", scaffold.sort_prefix, scaffold.label)),
            insert_text_format: Some(InsertTextFormat::SNIPPET),
            insert_text: replace.is_none().then(|| scaffold.body.to_string()),
            text_edit: replace.map(|range| {
                CompletionTextEdit::Edit(TextEdit {
                    range,
                    new_text: scaffold.body.to_string(),
                })
            }),
            ..Default::default()
        })
        .collect()
}

/// Attribute completion inside a `<style` opening tag.
fn style_attribute_items(line: &str) -> Vec<CompletionItem> {
    if line.ends_with("lang=\"") || line.ends_with("lang='") {
        return STYLE_LANGUAGES
            .iter()
            .map(|language| CompletionItem {
                label: language.to_string(),
                kind: Some(CompletionItemKind::FIELD),
                ..Default::default()
            })
            .collect();
    }

    ["lang", "scoped"]
        .into_iter()
        .map(|attribute| CompletionItem {
            label: attribute.to_string(),
            kind: Some(CompletionItemKind::PROPERTY),
            ..Default::default()
        })
        .collect()
}
