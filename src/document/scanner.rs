//! Tolerant scanner for the top-level blocks of a component document.
//!
//! This is a best-effort character scanner, not a markup parser. It only
//! looks at tags at the top nesting level and accepts documents that are
//! malformed while being edited:
//!
//! - Scanning is forward-only. Each top-level opening tag starts a block.
//! - A block ends at its closing tag or at the next *boundary*, whichever
//!   comes first. A boundary is an opening tag of a `template`, `script`,
//!   `style` or configured custom block, wherever it sits. An unclosed block
//!   therefore never swallows a later block of the same name. Without a
//!   boundary it runs to the end of the document.
//! - The `template` block counts nested `template` elements, so those are not
//!   boundaries for it, and ignores tags inside markup comments. Raw-text
//!   blocks (`script`, `style`, custom blocks) end at the first closing tag.
//! - An attribute value with an unterminated quote ends at the next `>`
//!   (or before the next `<`).
//! - Top-level comments are skipped, as are stray closing tags.
//! - Self-closing top-level tags have no content and produce no block.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::settings::{BlockSettings, DialectSettings};

use super::region::BlockKind;

/// Tag name directly after `<`.
static TAG_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.:-]*").unwrap());

const TEMPLATE_LANGUAGES: &[(&str, &str)] = &[("html", "html"), ("pug", "pug"), ("jade", "pug")];

const SCRIPT_LANGUAGES: &[(&str, &str)] = &[
    ("js", "javascript"),
    ("javascript", "javascript"),
    ("jsx", "javascriptreact"),
    ("ts", "typescript"),
    ("typescript", "typescript"),
    ("tsx", "typescriptreact"),
    ("text/javascript", "javascript"),
    ("application/javascript", "javascript"),
    ("text/babel", "javascript"),
    ("text/typescript", "typescript"),
];

const STYLE_LANGUAGES: &[(&str, &str)] = &[
    ("css", "css"),
    ("scss", "scss"),
    ("sass", "sass"),
    ("less", "less"),
    ("stylus", "stylus"),
    ("styl", "stylus"),
    ("postcss", "postcss"),
    ("pcss", "postcss"),
];

/// A top-level block found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScannedBlock {
    pub kind: BlockKind,
    /// Content between the opening tag's `>` and the closing tag.
    pub content: Range<usize>,
    pub language_id: String,
    /// Raw value of the attribute the language was taken from.
    pub attribute_language_id: Option<String>,
}

#[derive(Debug)]
struct OpenTag {
    name: String,
    attributes: Vec<(String, String)>,
    /// Offset just after the tag.
    end: usize,
    self_closing: bool,
}

impl OpenTag {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Scan `text` for top-level blocks, in document order.
pub(crate) fn scan_blocks(text: &str, settings: &BlockSettings) -> Vec<ScannedBlock> {
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some(rel) = text[pos..].find('<') {
        let lt = pos + rel;
        let rest = &text[lt..];

        if rest.starts_with("<!--") {
            pos = skip_comment(text, lt);
            continue;
        }
        if rest.starts_with("</") {
            pos = rest.find('>').map(|i| lt + i + 1).unwrap_or(text.len());
            continue;
        }
        let Some(tag) = parse_open_tag(text, lt) else {
            pos = lt + 1;
            continue;
        };
        if tag.self_closing {
            pos = tag.end;
            continue;
        }

        let kind = BlockKind::from_tag(&tag.name);
        let (content_end, resume) = find_block_end(text, tag.end, &tag.name, &kind, settings);
        let (language_id, attribute_language_id) = resolve_language(&kind, &tag, settings);
        blocks.push(ScannedBlock {
            kind,
            content: tag.end..content_end,
            language_id,
            attribute_language_id,
        });
        pos = resume.max(tag.end);
    }

    blocks
}

fn skip_comment(text: &str, lt: usize) -> usize {
    text[lt + 4..]
        .find("-->")
        .map(|i| lt + 4 + i + 3)
        .unwrap_or(text.len())
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':')
}

/// Parse the opening tag starting at `lt`. Returns `None` if no tag name follows `<`.
fn parse_open_tag(text: &str, lt: usize) -> Option<OpenTag> {
    let name_match = TAG_NAME_PATTERN.find(&text[lt + 1..])?;
    let bytes = text.as_bytes();
    let mut tag = OpenTag {
        name: name_match.as_str().to_ascii_lowercase(),
        attributes: Vec::new(),
        end: text.len(),
        self_closing: false,
    };
    let mut i = lt + 1 + name_match.end();

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let Some(&b) = bytes.get(i) else {
            tag.end = text.len();
            return Some(tag);
        };
        match b {
            b'>' => {
                tag.end = i + 1;
                return Some(tag);
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                tag.end = i + 2;
                tag.self_closing = true;
                return Some(tag);
            }
            // a new tag interrupts an unfinished one
            b'<' => {
                tag.end = i;
                return Some(tag);
            }
            b'/' | b'=' | b'"' | b'\'' => i += 1,
            _ => {
                let name_start = i;
                while i < bytes.len()
                    && !bytes[i].is_ascii_whitespace()
                    && !matches!(bytes[i], b'=' | b'>' | b'<' | b'/' | b'"' | b'\'')
                {
                    i += 1;
                }
                let name = text[name_start..i].to_ascii_lowercase();

                let mut j = i;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                let mut value = String::new();
                if bytes.get(j) == Some(&b'=') {
                    j += 1;
                    while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                        j += 1;
                    }
                    let (v, next) = read_attribute_value(text, j);
                    value = v.to_string();
                    i = next;
                }
                tag.attributes.push((name, value));
            }
        }
    }
}

/// Read an attribute value starting at `start`, returning it and the offset after it.
fn read_attribute_value(text: &str, start: usize) -> (&str, usize) {
    let bytes = text.as_bytes();
    match bytes.get(start) {
        Some(&quote @ (b'"' | b'\'')) => {
            let body = start + 1;
            let close = text[body..].find(quote as char).map(|i| body + i);
            let next_lt = text[body..].find('<').map(|i| body + i);
            match (close, next_lt) {
                (Some(close), Some(lt)) if close > lt => unterminated_value(text, body),
                (Some(close), _) => (&text[body..close], close + 1),
                (None, _) => unterminated_value(text, body),
            }
        }
        _ => {
            let mut i = start;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'>' | b'<')
            {
                if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'>') {
                    break;
                }
                i += 1;
            }
            (&text[start..i], i)
        }
    }
}

/// An unterminated quoted value runs to the next tag delimiter.
fn unterminated_value(text: &str, body: usize) -> (&str, usize) {
    let stop = text[body..]
        .find(['>', '<'])
        .map(|i| body + i)
        .unwrap_or(text.len());
    (&text[body..stop], stop)
}

/// Find where a block's content ends and where scanning resumes.
fn find_block_end(
    text: &str,
    from: usize,
    name: &str,
    kind: &BlockKind,
    settings: &BlockSettings,
) -> (usize, usize) {
    let markup = *kind == BlockKind::Template;
    let boundary = next_boundary(text, from, settings, markup).unwrap_or(text.len());
    let close = if markup {
        find_nested_close(text, from, boundary, name)
    } else {
        find_close_tag(text, from, boundary, name)
    };
    match close {
        Some(close) => (close.start, close.end),
        None => (boundary, boundary),
    }
}

fn is_block_name(name: &str, settings: &BlockSettings) -> bool {
    matches!(name, "template" | "script" | "style") || settings.custom.contains_key(name)
}

/// Offset of the next opening tag of a recognized block.
///
/// Inside markup, comments are skipped and nested `template` elements are
/// left to the nesting counter.
fn next_boundary(text: &str, from: usize, settings: &BlockSettings, markup: bool) -> Option<usize> {
    let mut pos = from;
    while let Some(rel) = text[pos..].find('<') {
        let lt = pos + rel;
        if markup && text[lt..].starts_with("<!--") {
            pos = skip_comment(text, lt);
            continue;
        }
        if let Some(name) = TAG_NAME_PATTERN.find(&text[lt + 1..]) {
            let name = name.as_str().to_ascii_lowercase();
            if !(markup && name == "template") && is_block_name(&name, settings) {
                return Some(lt);
            }
        }
        pos = lt + 1;
    }
    None
}

/// Does `text[at..]` start with `<` + `name` (case-insensitive) followed by a non-name byte?
fn tag_name_at(text: &str, at: usize, name: &str) -> bool {
    let bytes = text.as_bytes();
    let end = at + name.len();
    end <= bytes.len()
        && bytes[at..end].eq_ignore_ascii_case(name.as_bytes())
        && bytes.get(end).map_or(true, |&b| !is_name_byte(b))
}

/// Close tag extent: from `</` to just after the following `>` (or `limit`).
fn close_tag_extent(text: &str, lt: usize, name: &str, limit: usize) -> Range<usize> {
    let after_name = lt + 2 + name.len();
    let end = text[after_name..limit]
        .find('>')
        .map(|i| after_name + i + 1)
        .unwrap_or(limit);
    lt..end
}

fn find_close_tag(text: &str, from: usize, limit: usize, name: &str) -> Option<Range<usize>> {
    let mut pos = from;
    while let Some(rel) = text[pos..limit].find("</") {
        let lt = pos + rel;
        if tag_name_at(text, lt + 2, name) {
            return Some(close_tag_extent(text, lt, name, limit));
        }
        pos = lt + 2;
    }
    None
}

/// Like [`find_close_tag`], counting nested opening tags of the same name.
fn find_nested_close(text: &str, from: usize, limit: usize, name: &str) -> Option<Range<usize>> {
    let mut depth = 1usize;
    let mut pos = from;
    while let Some(rel) = text[pos..limit].find('<') {
        let lt = pos + rel;
        let rest = &text[lt..limit];
        if rest.starts_with("<!--") {
            pos = skip_comment(text, lt).min(limit);
            continue;
        }
        if rest.starts_with("</") && tag_name_at(text, lt + 2, name) {
            depth -= 1;
            if depth == 0 {
                return Some(close_tag_extent(text, lt, name, limit));
            }
            pos = lt + 2;
            continue;
        }
        if tag_name_at(text, lt + 1, name) {
            match parse_open_tag(text, lt) {
                Some(tag) if !tag.self_closing => depth += 1,
                _ => {}
            }
        }
        pos = lt + 1;
    }
    None
}

/// Resolve the language of a block from its opening tag.
///
/// Returns the language id and the raw attribute value it came from.
fn resolve_language(kind: &BlockKind, tag: &OpenTag, settings: &BlockSettings) -> (String, Option<String>) {
    let lang = tag.attribute("lang");

    let (dialects, builtin, fallback) = match kind {
        BlockKind::Template => (&settings.template, TEMPLATE_LANGUAGES, "html"),
        BlockKind::Script => (&settings.script, SCRIPT_LANGUAGES, "javascript"),
        BlockKind::Style => (&settings.style, STYLE_LANGUAGES, "css"),
        BlockKind::Custom(name) => {
            if let Some(lang) = lang {
                return (lang.to_ascii_lowercase(), Some(lang.to_string()));
            }
            let language = settings
                .custom
                .get(name)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());
            return (language, None);
        }
        BlockKind::Outer => return (settings.outer.clone(), None),
    };

    if let Some(lang) = lang {
        let key = lang.to_ascii_lowercase();
        let language = lookup_dialect(dialects, builtin, &key).unwrap_or(key);
        return (language, Some(lang.to_string()));
    }
    if *kind == BlockKind::Script {
        if let Some(ty) = tag.attribute("type") {
            if let Some(language) = lookup_dialect(dialects, builtin, &ty.to_ascii_lowercase()) {
                return (language, Some(ty.to_string()));
            }
        }
    }
    let default = dialects.default.as_deref().unwrap_or(fallback);
    (default.to_string(), None)
}

fn lookup_dialect(dialects: &DialectSettings, builtin: &[(&str, &str)], key: &str) -> Option<String> {
    dialects.languages.get(key).cloned().or_else(|| {
        builtin
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, language)| language.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(text: &str) -> Vec<(BlockKind, &str, String)> {
        scan_blocks(text, &BlockSettings::default())
            .into_iter()
            .map(|b| (b.kind, &text[b.content], b.language_id))
            .collect()
    }

    #[test]
    fn three_fixed_blocks() {
        let blocks = scan("<template><div/></template>\n<script>let x=1</script>\n<style>.a{}</style>");
        assert_eq!(
            blocks,
            vec![
                (BlockKind::Template, "<div/>", "html".to_string()),
                (BlockKind::Script, "let x=1", "javascript".to_string()),
                (BlockKind::Style, ".a{}", "css".to_string()),
            ]
        );
    }

    #[test]
    fn lang_attribute_selects_dialect() {
        let blocks = scan_blocks(
            "<script lang=\"ts\"></script><style lang='scss' scoped></style><template lang=pug></template>",
            &BlockSettings::default(),
        );
        assert_eq!(blocks[0].language_id, "typescript");
        assert_eq!(blocks[0].attribute_language_id.as_deref(), Some("ts"));
        assert_eq!(blocks[1].language_id, "scss");
        assert_eq!(blocks[2].language_id, "pug");
    }

    #[test]
    fn unknown_lang_is_kept_verbatim() {
        let blocks = scan_blocks("<style lang=\"Sugarss\"></style>", &BlockSettings::default());
        assert_eq!(blocks[0].language_id, "sugarss");
        assert_eq!(blocks[0].attribute_language_id.as_deref(), Some("Sugarss"));
    }

    #[test]
    fn script_type_attribute() {
        let blocks = scan_blocks(
            "<script type=\"text/typescript\"></script>\n<script type=\"module\"></script>",
            &BlockSettings::default(),
        );
        assert_eq!(blocks[0].language_id, "typescript");
        assert_eq!(blocks[1].language_id, "javascript");
        assert_eq!(blocks[1].attribute_language_id, None);
    }

    #[test]
    fn configured_dialects_override_builtins() {
        let mut settings = BlockSettings::default();
        settings.style.default = Some("scss".to_string());
        settings
            .style
            .languages
            .insert("css".to_string(), "postcss".to_string());
        let blocks = scan_blocks("<style></style><style lang=\"css\"></style>", &settings);
        assert_eq!(blocks[0].language_id, "scss");
        assert_eq!(blocks[1].language_id, "postcss");
    }

    #[test]
    fn custom_blocks() {
        let mut settings = BlockSettings::default();
        settings
            .custom
            .insert("i18n".to_string(), "json".to_string());
        let blocks = scan_blocks(
            "<i18n>{}</i18n>\n<docs lang=\"md\"># x</docs>\n<other>y</other>",
            &settings,
        );
        assert_eq!(blocks[0].kind, BlockKind::Custom("i18n".to_string()));
        assert_eq!(blocks[0].language_id, "json");
        assert_eq!(blocks[1].language_id, "md");
        assert_eq!(blocks[2].language_id, "unknown");
    }

    #[test]
    fn nested_templates_are_counted() {
        let text = "<template>\n  <template v-if=\"a\">x</template>\n  <p/>\n</template>\n<script></script>";
        let blocks = scan(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(
            blocks[0].1,
            "\n  <template v-if=\"a\">x</template>\n  <p/>\n"
        );
    }

    #[test]
    fn script_content_is_raw_text() {
        let blocks = scan("<script>if (a </b) { x = '<div>' }</script>");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].1, "if (a </b) { x = '<div>' }");
    }

    #[test]
    fn unclosed_script_runs_to_end() {
        let text = "<template></template>\n<script>\nlet a = 1\n";
        let blocks = scan(text);
        assert_eq!(blocks[1].1, "\nlet a = 1\n");
    }

    #[test]
    fn unclosed_block_stops_at_next_block() {
        let text = "<script>\nlet a\n<style>\n.a{}\n</style>";
        let blocks = scan(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].1, "\nlet a\n");
        assert_eq!(blocks[1].1, "\n.a{}\n");
    }

    #[test]
    fn unclosed_block_does_not_swallow_same_name() {
        let text = "<style>\n.a{\n<style lang=\"scss\">\n.b{}\n</style>";
        let blocks = scan(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].1, "\n.a{\n");
        assert_eq!(blocks[1].2, "scss");
    }

    #[test]
    fn unclosed_block_stops_at_tag_on_same_line() {
        let blocks = scan("<template><div/></template><script>let x=1<style>.a{color:red}</style>");
        assert_eq!(
            blocks,
            vec![
                (BlockKind::Template, "<div/>", "html".to_string()),
                (BlockKind::Script, "let x=1", "javascript".to_string()),
                (BlockKind::Style, ".a{color:red}", "css".to_string()),
            ]
        );
    }

    #[test]
    fn indented_same_name_tag_starts_new_block() {
        let text = "<style>\n.a{\n  <style lang=\"scss\">\n.b{}\n</style>";
        let blocks = scan(text);
        assert_eq!(
            blocks,
            vec![
                (BlockKind::Style, "\n.a{\n  ", "css".to_string()),
                (BlockKind::Style, "\n.b{}\n", "scss".to_string()),
            ]
        );
    }

    #[test]
    fn configured_custom_block_is_a_boundary() {
        let mut settings = BlockSettings::default();
        settings.custom.insert("i18n".to_string(), "json".to_string());
        let text = "<script>let a <i18n>{}</i18n>";
        let blocks = scan_blocks(text, &settings);
        assert_eq!(blocks.len(), 2);
        assert_eq!(&text[blocks[0].content.clone()], "let a ");
        assert_eq!(blocks[1].language_id, "json");
    }

    #[test]
    fn unindented_nested_template_is_counted() {
        let text = "<template>\n<template v-if=\"a\">x</template>\n</template>\n<script>y</script>";
        let blocks = scan(text);
        assert_eq!(
            blocks,
            vec![
                (
                    BlockKind::Template,
                    "\n<template v-if=\"a\">x</template>\n",
                    "html".to_string()
                ),
                (BlockKind::Script, "y", "javascript".to_string()),
            ]
        );
    }

    #[test]
    fn commented_tags_in_template_are_not_boundaries() {
        let text = "<template>\n<!-- <script> -->\n<p/>\n</template>";
        let blocks = scan(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].1, "\n<!-- <script> -->\n<p/>\n");
    }

    #[test]
    fn style_tag_inside_template_ends_it() {
        let text = "<template>\n  <style>x</style>\n</template>";
        let blocks = scan(text);
        assert_eq!(blocks[0].1, "\n  ");
        assert_eq!(blocks[1], (BlockKind::Style, "x", "css".to_string()));
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn unterminated_quote_ends_at_tag_delimiter() {
        let text = "<style lang=\"scss>\n.a{}\n</style>";
        let blocks = scan_blocks(text, &BlockSettings::default());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language_id, "scss");
        assert_eq!(&text[blocks[0].content.clone()], "\n.a{}\n");
    }

    #[test]
    fn comments_and_stray_closers_are_skipped() {
        let text = "<!-- <script> -->\n</div>\n<style>a</style>";
        let blocks = scan(text);
        assert_eq!(blocks, vec![(BlockKind::Style, "a", "css".to_string())]);
    }

    #[test]
    fn self_closing_block_has_no_region() {
        let blocks = scan("<docs/>\n<script>x</script>");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].0, BlockKind::Script);
    }

    #[test]
    fn unfinished_opening_tag_at_end() {
        let text = "<template></template>\n<scr";
        let blocks = scan_blocks(text, &BlockSettings::default());
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].content, text.len()..text.len());
    }

    #[test]
    fn close_tags_are_case_insensitive() {
        let blocks = scan("<script>a</SCRIPT >");
        assert_eq!(blocks[0].1, "a");
    }
}
