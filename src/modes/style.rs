//! Style languages: css, scss, less and postcss.
//!
//! Analysis runs on the single-language view of the host document. A light
//! rule scan gives selector symbols, folding, brace diagnostics and color
//! literals; variables are highlighted and resolved by name.

use std::ops::Range as Span;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tower_lsp::lsp_types::*;

use crate::document::{DocumentRegions, LanguageModelCache, TextDocument};
use crate::settings::CacheSettings;

use super::braces::{self, Braces, Syntax};
use super::{embedded_documents, symbol, LanguageMode};

static HEX_COLOR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([0-9a-fA-F]{3,8})\b").expect("valid hex color regex"));

static RGB_COLOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\brgba?\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*(?:,\s*([0-9]*\.?[0-9]+)\s*)?\)")
        .expect("valid rgb color regex")
});

/// At-rules offered after `@`, with hover documentation where we have it.
pub(super) const AT_RULES: &[(&str, &str)] = &[
    (
        "@apply",
        "Inline the declarations of existing utility classes into this rule.",
    ),
    ("@charset", "Specifies the character encoding of the style sheet."),
    ("@font-face", "Describes a font to download and use."),
    ("@import", "Includes the rules of another style sheet."),
    ("@keyframes", "Defines the steps of an animation sequence."),
    ("@media", "Applies rules only when a media query matches."),
    ("@namespace", "Declares an XML namespace for selectors."),
    ("@page", "Styles printed pages."),
    ("@supports", "Applies rules only when the browser supports a feature."),
];

const SCSS_AT_RULES: &[(&str, &str)] = &[
    ("@each", "Iterates over a list or map."),
    ("@extend", "Shares the styles of another selector."),
    ("@for", "Iterates over a numeric range."),
    ("@forward", "Re-exports the members of a module."),
    ("@function", "Defines a function returning a value."),
    ("@if", "Includes styles when a condition holds."),
    ("@include", "Includes the styles of a mixin."),
    ("@mixin", "Defines reusable styles."),
    ("@use", "Loads the members of a module."),
];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '$' | '@')
}

/// A selector or at-rule with its block.
#[derive(Debug, Clone, PartialEq)]
struct Rule {
    selector: String,
    /// From the selector start to just past the closing brace.
    span: Span<usize>,
}

#[derive(Debug)]
struct Stylesheet {
    /// Text with comments blanked, same layout as the source.
    plain: String,
    braces: Braces,
    rules: Vec<Rule>,
    colors: Vec<(Span<usize>, Color)>,
}

impl Stylesheet {
    fn parse(text: &str, syntax: Syntax) -> Self {
        let braces = braces::scan(text, syntax);

        let mut plain = text.to_string();
        for comment in &braces.comments {
            let blank: String = text[comment.clone()]
                .chars()
                .map(|c| match c {
                    '\n' | '\r' => c.to_string(),
                    _ => " ".repeat(c.len_utf8()),
                })
                .collect();
            plain.replace_range(comment.clone(), &blank);
        }

        let mut rules: Vec<Rule> = braces
            .pairs
            .iter()
            .filter_map(|&(open, close)| {
                let head = &plain[..open];
                let start = head.rfind(['{', '}', ';']).map_or(0, |p| p + 1);
                let raw = &head[start..];
                let selector = raw.split_whitespace().collect::<Vec<_>>().join(" ");
                if selector.is_empty() {
                    return None;
                }
                let start = start + (raw.len() - raw.trim_start().len());
                Some(Rule {
                    selector,
                    span: start..close + 1,
                })
            })
            .collect();
        rules.sort_by_key(|r| r.span.start);

        let colors = find_colors(&plain);
        Self {
            plain,
            braces,
            rules,
            colors,
        }
    }
}

fn find_colors(plain: &str) -> Vec<(Span<usize>, Color)> {
    // A value follows `prop:` and ends at `;` or `}`, never at `{`.
    let in_declaration = |span: &Span<usize>| {
        let head = &plain[..span.start];
        let decl_start = head.rfind(['{', '}', ';']).map_or(0, |p| p + 1);
        let tail = &plain[span.end..];
        head[decl_start..].contains(':')
            && tail.find(['{', '}', ';']).map(|p| tail.as_bytes()[p]) != Some(b'{')
    };

    let mut colors = Vec::new();
    for caps in HEX_COLOR_PATTERN.captures_iter(plain) {
        let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let span = whole.range();
        if !in_declaration(&span) {
            continue;
        }
        if let Some(color) = parse_hex(digits.as_str()) {
            colors.push((span, color));
        }
    }
    for caps in RGB_COLOR_PATTERN.captures_iter(plain) {
        let Some(whole) = caps.get(0) else { continue };
        let span = whole.range();
        if !in_declaration(&span) {
            continue;
        }
        let channel = |i: usize| -> Option<f32> {
            let value: u16 = caps.get(i)?.as_str().parse().ok()?;
            (value <= 255).then(|| f32::from(value) / 255.0)
        };
        let alpha = match caps.get(4) {
            Some(a) => a.as_str().parse::<f32>().ok().map(|a| a.clamp(0.0, 1.0)),
            None => Some(1.0),
        };
        if let (Some(red), Some(green), Some(blue), Some(alpha)) =
            (channel(1), channel(2), channel(3), alpha)
        {
            colors.push((
                span,
                Color {
                    red,
                    green,
                    blue,
                    alpha,
                },
            ));
        }
    }
    colors.sort_by_key(|(span, _)| span.start);
    colors
}

fn parse_hex(digits: &str) -> Option<Color> {
    let nibble = |i: usize| u8::from_str_radix(&digits[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    let (r, g, b, a) = match digits.len() {
        3 => (nibble(0)?, nibble(1)?, nibble(2)?, 255),
        4 => (nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?),
        6 => (byte(0)?, byte(2)?, byte(4)?, 255),
        8 => (byte(0)?, byte(2)?, byte(4)?, byte(6)?),
        _ => return None,
    };
    Some(Color {
        red: f32::from(r) / 255.0,
        green: f32::from(g) / 255.0,
        blue: f32::from(b) / 255.0,
        alpha: f32::from(a) / 255.0,
    })
}

/// rgb, hex and hsl spellings of a color.
fn color_presentations(color: Color, range: Range) -> Vec<ColorPresentation> {
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    let (r, g, b) = (channel(color.red), channel(color.green), channel(color.blue));
    let alpha = (color.alpha.clamp(0.0, 1.0) * 100.0).round() / 100.0;
    let (h, s, l) = to_hsl(&color);

    let labels = if alpha >= 1.0 {
        [
            format!("rgb({r}, {g}, {b})"),
            format!("#{r:02x}{g:02x}{b:02x}"),
            format!("hsl({h}, {s}%, {l}%)"),
        ]
    } else {
        [
            format!("rgba({r}, {g}, {b}, {alpha})"),
            format!("#{r:02x}{g:02x}{b:02x}{:02x}", channel(color.alpha)),
            format!("hsla({h}, {s}%, {l}%, {alpha})"),
        ]
    };

    labels
        .into_iter()
        .map(|label| ColorPresentation {
            text_edit: Some(TextEdit {
                range,
                new_text: label.clone(),
            }),
            label,
            additional_text_edits: None,
        })
        .collect()
}

/// Hue in degrees, saturation and lightness in percent.
fn to_hsl(color: &Color) -> (u32, u32, u32) {
    let (r, g, b) = (color.red, color.green, color.blue);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let lightness = (max + min) / 2.0;
    let delta = max - min;
    if delta == 0.0 {
        return (0, 0, (lightness * 100.0).round() as u32);
    }
    let saturation = delta / (1.0 - (2.0 * lightness - 1.0).abs());
    let hue = if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    (
        hue.round() as u32 % 360,
        (saturation * 100.0).round() as u32,
        (lightness * 100.0).round() as u32,
    )
}

pub struct StyleMode {
    id: String,
    embedded: LanguageModelCache<TextDocument>,
    stylesheets: LanguageModelCache<Stylesheet>,
}

impl StyleMode {
    pub fn new(
        language_id: &str,
        regions: &Arc<LanguageModelCache<DocumentRegions>>,
        cache: &CacheSettings,
    ) -> Self {
        let syntax = Syntax {
            line_comments: language_id != "css",
            backtick_strings: false,
        };
        Self {
            id: language_id.to_string(),
            embedded: embedded_documents(language_id, regions, cache),
            stylesheets: LanguageModelCache::new(cache.max_entries, cache.max_age(), move |d| {
                Stylesheet::parse(d.text(), syntax)
            }),
        }
    }

    fn analyze(&self, document: &TextDocument) -> (Arc<TextDocument>, Arc<Stylesheet>) {
        let embedded = self.embedded.refresh_and_get(document);
        let stylesheet = self.stylesheets.refresh_and_get(&embedded);
        (embedded, stylesheet)
    }

    fn at_rules(&self) -> impl Iterator<Item = &'static (&'static str, &'static str)> {
        let extra: &'static [(&str, &str)] = if self.id == "scss" { SCSS_AT_RULES } else { &[] };
        AT_RULES.iter().chain(extra)
    }

    /// Occurrences of the variable under the cursor.
    fn variable_occurrences(
        &self,
        document: &TextDocument,
        position: Position,
    ) -> Option<(String, Vec<Span<usize>>)> {
        let (embedded, sheet) = self.analyze(document);
        let span = embedded.word_span_at(embedded.offset_at(position), is_word_char);
        let word = &sheet.plain[span];
        let is_variable = (word.len() > 1 && (word.starts_with('$') || word.starts_with('@')))
            || (word.len() > 2 && word.starts_with("--"));
        if !is_variable || self.at_rules().any(|(name, _)| *name == word) {
            return None;
        }

        let spans = sheet
            .plain
            .match_indices(word)
            .map(|(start, _)| start..start + word.len())
            .filter(|s| embedded.word_span_at(s.start + 1, is_word_char) == *s)
            .collect();
        Some((word.to_string(), spans))
    }
}

impl LanguageMode for StyleMode {
    fn id(&self) -> &str {
        &self.id
    }

    fn do_validation(&self, document: &TextDocument) -> Vec<Diagnostic> {
        if self.id == "postcss" {
            return Vec::new();
        }
        let (embedded, sheet) = self.analyze(document);
        let diagnostic = |offset: usize, message: &str| Diagnostic {
            range: embedded.span_to_range(&(offset..offset + 1)),
            severity: Some(DiagnosticSeverity::ERROR),
            source: Some(self.id.clone()),
            message: message.to_string(),
            ..Default::default()
        };

        let mut diagnostics: Vec<Diagnostic> = sheet
            .braces
            .unclosed
            .iter()
            .map(|&offset| diagnostic(offset, "'}' expected"))
            .chain(
                sheet
                    .braces
                    .unopened
                    .iter()
                    .map(|&offset| diagnostic(offset, "Unexpected '}'")),
            )
            .collect();
        diagnostics.sort_by_key(|d| d.range.start);
        diagnostics
    }

    fn do_complete(&self, document: &TextDocument, position: Position) -> Option<CompletionList> {
        let embedded = self.embedded.refresh_and_get(document);
        let offset = embedded.offset_at(position);
        let span = embedded.word_span_at(offset, is_word_char);
        let typed = &embedded.text()[span.start..offset];
        if !typed.starts_with('@') {
            return None;
        }

        let range = embedded.span_to_range(&span);
        let items = self
            .at_rules()
            .filter(|(name, _)| name.starts_with(typed))
            .map(|(name, description)| CompletionItem {
                label: name.to_string(),
                kind: Some(CompletionItemKind::KEYWORD),
                documentation: Some(Documentation::String(description.to_string())),
                text_edit: Some(CompletionTextEdit::Edit(TextEdit {
                    range,
                    new_text: name.to_string(),
                })),
                ..Default::default()
            })
            .collect();
        Some(CompletionList {
            is_incomplete: false,
            items,
        })
    }

    fn do_hover(&self, document: &TextDocument, position: Position) -> Option<Hover> {
        let embedded = self.embedded.refresh_and_get(document);
        let span = embedded.word_span_at(embedded.offset_at(position), is_word_char);
        let word = &embedded.text()[span.clone()];
        let (name, description) = self.at_rules().find(|(name, _)| *name == word)?;
        Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: format!("**{name}**\n\n{description}"),
            }),
            range: Some(embedded.span_to_range(&span)),
        })
    }

    fn find_document_highlight(
        &self,
        document: &TextDocument,
        position: Position,
    ) -> Vec<DocumentHighlight> {
        let Some((_, spans)) = self.variable_occurrences(document, position) else {
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
        let (embedded, sheet) = self.analyze(document);
        sheet
            .rules
            .iter()
            .map(|rule| {
                let kind = if rule.selector.starts_with('@') {
                    SymbolKind::MODULE
                } else {
                    SymbolKind::CLASS
                };
                symbol(&rule.selector, kind, &embedded, &rule.span)
            })
            .collect()
    }

    fn find_definition(&self, document: &TextDocument, position: Position) -> Vec<Location> {
        let Some((word, spans)) = self.variable_occurrences(document, position) else {
            return Vec::new();
        };
        let (_, sheet) = self.analyze(document);
        spans
            .into_iter()
            .find(|span| sheet.plain[span.end..].trim_start().starts_with(':'))
            .map(|span| {
                log::trace!("{} defined at {:?}", word, span);
                Location {
                    uri: document.uri().clone(),
                    range: document.span_to_range(&span),
                }
            })
            .into_iter()
            .collect()
    }

    fn find_references(&self, document: &TextDocument, position: Position) -> Vec<Location> {
        let Some((_, spans)) = self.variable_occurrences(document, position) else {
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

    fn find_document_colors(&self, document: &TextDocument) -> Vec<ColorInformation> {
        let (embedded, sheet) = self.analyze(document);
        sheet
            .colors
            .iter()
            .map(|(span, color)| ColorInformation {
                range: embedded.span_to_range(span),
                color: color.clone(),
            })
            .collect()
    }

    fn get_color_presentations(
        &self,
        _document: &TextDocument,
        color: Color,
        range: Range,
    ) -> Vec<ColorPresentation> {
        color_presentations(color, range)
    }

    fn get_folding_ranges(&self, document: &TextDocument) -> Vec<FoldingRange> {
        let (embedded, sheet) = self.analyze(document);
        braces::folding_ranges(&embedded, &sheet.braces)
    }

    fn on_document_removed(&self, uri: &Url) {
        self.embedded.on_document_removed(uri);
        self.stylesheets.on_document_removed(uri);
    }

    fn dispose(&self) {
        self.embedded.dispose();
        self.stylesheets.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    fn mode(language: &str) -> StyleMode {
        let settings = Settings::default();
        let blocks = settings.blocks.clone();
        let regions = Arc::new(LanguageModelCache::new(10, settings.cache.max_age(), move |d| {
            DocumentRegions::parse(d, &blocks)
        }));
        StyleMode::new(language, &regions, &settings.cache)
    }

    fn doc(text: &str) -> TextDocument {
        TextDocument::new(Url::parse("file:///a.vue").unwrap(), "vue", 1, text)
    }

    #[test]
    fn selector_symbols_in_host_coordinates() {
        let d = doc("<template><div/></template>\n<style>\n.a,\n.b { color: red }\n@media print {\n  p { x: y }\n}\n</style>");
        let symbols = mode("css").find_document_symbols(&d);
        let names: Vec<_> = symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![".a, .b", "@media print", "p"]);
        assert_eq!(symbols[0].location.range.start, Position::new(2, 0));
        assert_eq!(symbols[0].location.range.end, Position::new(3, 18));
        assert_eq!(symbols[1].kind, SymbolKind::MODULE);
    }

    #[test]
    fn brace_diagnostics() {
        let d = doc("<style>\n.a { color: red\n</style>");
        let diagnostics = mode("css").do_validation(&d);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "'}' expected");
        assert_eq!(diagnostics[0].range.start, Position::new(1, 3));

        let d = doc("<style lang=\"postcss\">\n.a { color: red\n</style>");
        assert!(mode("postcss").do_validation(&d).is_empty());
    }

    #[test]
    fn only_owned_language_is_analyzed() {
        let d = doc("<style lang=\"scss\">\n.a {\n</style>\n<style>\n.b {}\n</style>");
        assert!(mode("css").do_validation(&d).is_empty());
        assert_eq!(mode("scss").do_validation(&d).len(), 1);
    }

    #[test]
    fn colors_in_declarations_only() {
        let d = doc("<style>\n#fed { color: #ff0000; background: rgba(0, 0, 255, 0.5) }\n</style>");
        let colors = mode("css").find_document_colors(&d);
        assert_eq!(colors.len(), 2);
        assert_eq!(colors[0].range.start, Position::new(1, 14));
        assert_eq!(colors[0].color.red, 1.0);
        assert_eq!(colors[1].color.alpha, 0.5);
    }

    #[test]
    fn presentations_of_a_color() {
        let range = Range::new(Position::new(0, 0), Position::new(0, 4));
        let red = Color {
            red: 1.0,
            green: 0.0,
            blue: 0.0,
            alpha: 1.0,
        };
        let labels: Vec<_> = color_presentations(red, range)
            .into_iter()
            .map(|p| p.label)
            .collect();
        assert_eq!(labels, vec!["rgb(255, 0, 0)", "#ff0000", "hsl(0, 100%, 50%)"]);
    }

    #[test]
    fn at_rule_completion_and_hover() {
        let d = doc("<style>\n.a { @ap }\n</style>");
        let list = mode("css").do_complete(&d, Position::new(1, 8)).unwrap();
        let labels: Vec<_> = list.items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["@apply"]);

        let d = doc("<style>\n.a { @apply p-2; }\n</style>");
        let hover = mode("css").do_hover(&d, Position::new(1, 7)).unwrap();
        let HoverContents::Markup(markup) = hover.contents else {
            panic!("expected markup");
        };
        assert!(markup.value.starts_with("**@apply**"));

        assert!(mode("css").do_complete(&d, Position::new(1, 3)).is_none());
    }

    #[test]
    fn scss_variables_resolve_by_name() {
        let d = doc("<style lang=\"scss\">\n$main: red;\n.a { color: $main; }\n</style>");
        let scss = mode("scss");
        let definition = scss.find_definition(&d, Position::new(2, 14));
        assert_eq!(definition.len(), 1);
        assert_eq!(definition[0].range.start, Position::new(1, 0));
        assert_eq!(scss.find_references(&d, Position::new(1, 2)).len(), 2);
        assert_eq!(scss.find_document_highlight(&d, Position::new(2, 13)).len(), 2);
    }

    #[test]
    fn folds_multi_line_rules() {
        let d = doc("<style>\n.a {\n  color: red;\n}\n</style>");
        let ranges = mode("css").get_folding_ranges(&d);
        assert_eq!(ranges.len(), 1);
        assert_eq!((ranges[0].start_line, ranges[0].end_line), (1, 2));
    }
}
