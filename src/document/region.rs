//! Language regions of a component document and the virtual documents
//! derived from them.
//!
//! [`DocumentRegions`] partitions a document into ordered, non-overlapping,
//! half-open regions that cover it exactly. Virtual documents keep the bytes
//! of the requested regions and blank out everything else, so they have the
//! same length and line layout as the source: an offset or position computed
//! in a virtual document is valid unchanged in the source document.

use std::ops::Range;

use crate::settings::BlockSettings;

use super::scanner::scan_blocks;
use super::TextDocument;

/// Kind of top-level block a region belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Template,
    Script,
    Style,
    Custom(String),
    /// Text outside every block, including the block tags themselves.
    Outer,
}

impl BlockKind {
    pub fn from_tag(name: &str) -> Self {
        match name {
            "template" => BlockKind::Template,
            "script" => BlockKind::Script,
            "style" => BlockKind::Style,
            other => BlockKind::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BlockKind::Template => "template",
            BlockKind::Script => "script",
            BlockKind::Style => "style",
            BlockKind::Custom(name) => name,
            BlockKind::Outer => "outer",
        }
    }
}

/// A contiguous range of the document attributed to one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub language_id: String,
    pub start: usize,
    pub end: usize,
    /// Raw `lang`/`type` attribute value declared on the block's opening tag.
    pub attribute_language_id: Option<String>,
    pub kind: BlockKind,
}

impl Region {
    /// Half-open containment: `start <= offset < end`.
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// The partition of one document version into regions.
#[derive(Debug, Clone)]
pub struct DocumentRegions {
    document: TextDocument,
    regions: Vec<Region>,
}

impl DocumentRegions {
    /// Partition a document.
    ///
    /// Block contents become regions of their declared language; the text
    /// between them becomes [`BlockKind::Outer`] regions. Empty blocks keep an
    /// empty region, empty gaps are omitted.
    pub fn parse(document: &TextDocument, settings: &BlockSettings) -> Self {
        let blocks = scan_blocks(document.text(), settings);
        let mut regions = Vec::with_capacity(blocks.len() * 2 + 1);
        let mut cursor = 0;

        for block in blocks {
            if block.content.start > cursor {
                regions.push(outer_region(settings, cursor, block.content.start));
            }
            cursor = block.content.end;
            regions.push(Region {
                language_id: block.language_id,
                start: block.content.start,
                end: block.content.end,
                attribute_language_id: block.attribute_language_id,
                kind: block.kind,
            });
        }
        if cursor < document.len() {
            regions.push(outer_region(settings, cursor, document.len()));
        }

        log::debug!(
            "partitioned {} v{} into {} regions",
            document.uri(),
            document.version(),
            regions.len()
        );
        Self {
            document: document.clone(),
            regions,
        }
    }

    /// The document this partition was computed from.
    pub fn document(&self) -> &TextDocument {
        &self.document
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// The region owning `offset`.
    ///
    /// Regions are half-open, so an offset at a region's end belongs to the
    /// following region. The end of the document belongs to the last region.
    pub fn region_at_offset(&self, offset: usize) -> Option<&Region> {
        let idx = self.regions.partition_point(|r| r.end <= offset);
        match self.regions.get(idx) {
            Some(region) if region.start <= offset => Some(region),
            Some(_) => None,
            None if offset == self.document.len() => {
                self.regions.iter().rev().find(|r| !r.is_empty())
            }
            None => None,
        }
    }

    pub fn language_at_offset(&self, offset: usize) -> Option<&str> {
        self.region_at_offset(offset).map(|r| r.language_id.as_str())
    }

    /// Distinct languages in order of first appearance.
    pub fn languages_in_document(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = Vec::new();
        for region in &self.regions {
            if !languages.contains(&region.language_id.as_str()) {
                languages.push(&region.language_id);
            }
        }
        languages
    }

    /// Regions overlapping `span`, clipped to it.
    pub fn regions_in_span(&self, span: Range<usize>) -> Vec<Region> {
        self.regions
            .iter()
            .filter(|r| r.start < span.end && span.start < r.end)
            .map(|r| Region {
                start: r.start.max(span.start),
                end: r.end.min(span.end),
                ..r.clone()
            })
            .collect()
    }

    /// A view of the document containing only the regions of `language_id`.
    ///
    /// If no region has that language the result is entirely blank.
    pub fn single_language_document(&self, language_id: &str) -> TextDocument {
        let text = self.masked_text(|r| r.language_id == language_id);
        self.document.with_masked_text(language_id, text)
    }

    /// A view containing only the region owning `offset`.
    pub fn single_region_document(&self, offset: usize) -> Option<(TextDocument, Region)> {
        let region = self.region_at_offset(offset)?.clone();
        let text = self.masked_text(|r| r.start == region.start && r.end == region.end);
        Some((
            self.document.with_masked_text(&region.language_id, text),
            region,
        ))
    }

    /// A view containing every block of one kind, whatever its language.
    pub fn single_kind_document(&self, kind: &BlockKind) -> TextDocument {
        let language_id = self
            .regions
            .iter()
            .find(|r| &r.kind == kind)
            .map(|r| r.language_id.clone())
            .unwrap_or_else(|| kind.as_str().to_string());
        let text = self.masked_text(|r| &r.kind == kind);
        self.document.with_masked_text(&language_id, text)
    }

    fn masked_text(&self, keep: impl Fn(&Region) -> bool) -> String {
        let source = self.document.text();
        let mut out = String::with_capacity(source.len());
        for region in &self.regions {
            let slice = &source[region.span()];
            if keep(region) {
                out.push_str(slice);
            } else {
                blank_into(&mut out, slice);
            }
        }
        out
    }
}

fn outer_region(settings: &BlockSettings, start: usize, end: usize) -> Region {
    Region {
        language_id: settings.outer.clone(),
        start,
        end,
        attribute_language_id: None,
        kind: BlockKind::Outer,
    }
}

/// Line breaks are kept; every other character becomes spaces of the same
/// UTF-8 width.
fn blank_into(out: &mut String, slice: &str) {
    for c in slice.chars() {
        match c {
            '\n' | '\r' => out.push(c),
            _ => out.extend(std::iter::repeat(' ').take(c.len_utf8())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::Url;

    const SCENARIO: &str =
        "<template><div>{{ x }}</div></template><script>let x=1</script><style>.a{color:red}</style>";

    fn parse(text: &str) -> DocumentRegions {
        let doc = TextDocument::new(Url::parse("file:///a.vue").unwrap(), "vue", 1, text);
        DocumentRegions::parse(&doc, &BlockSettings::default())
    }

    fn assert_total(regions: &DocumentRegions) {
        let mut cursor = 0;
        for region in regions.regions() {
            assert_eq!(region.start, cursor, "gap or overlap at {}", cursor);
            assert!(region.end >= region.start);
            cursor = region.end;
        }
        assert_eq!(cursor, regions.document().len());
    }

    fn newline_positions(s: &str) -> Vec<usize> {
        s.match_indices(['\n', '\r']).map(|(i, _)| i).collect()
    }

    #[test]
    fn scenario_partition() {
        let regions = parse(SCENARIO);
        assert_total(&regions);
        let explicit: Vec<_> = regions
            .regions()
            .iter()
            .filter(|r| r.kind != BlockKind::Outer)
            .map(|r| (r.language_id.as_str(), &SCENARIO[r.span()]))
            .collect();
        assert_eq!(
            explicit,
            vec![
                ("html", "<div>{{ x }}</div>"),
                ("javascript", "let x=1"),
                ("css", ".a{color:red}"),
            ]
        );
        assert!(regions.regions().iter().all(|r| !r.is_empty()));
    }

    #[test]
    fn scenario_css_document() {
        let regions = parse(SCENARIO);
        let css = regions.single_language_document("css");
        assert_eq!(css.len(), SCENARIO.len());
        assert_eq!(css.text().trim(), ".a{color:red}");
        let column = css.text().find(".a").unwrap();
        assert_eq!(column, SCENARIO.find(".a").unwrap());
        assert_eq!(css.language_id(), "css");
    }

    #[test]
    fn virtual_documents_keep_layout() {
        let text = "<template>\n  <p>é</p>\r\n</template>\n<script>\nconst a = '😀'\n</script>\n<style lang=\"scss\">\n.a { b: c }\n</style>\n";
        let regions = parse(text);
        assert_total(&regions);
        for language in ["html", "javascript", "scss", "vue", "missing"] {
            let virt = regions.single_language_document(language);
            assert_eq!(virt.len(), text.len(), "{language}");
            assert_eq!(newline_positions(virt.text()), newline_positions(text));
            assert_eq!(virt.line_count(), regions.document().line_count());
        }
        let missing = regions.single_language_document("missing");
        assert!(missing.text().chars().all(|c| c.is_whitespace()));
    }

    #[test]
    fn partition_is_idempotent() {
        let a = parse(SCENARIO);
        let b = parse(SCENARIO);
        assert_eq!(a.regions(), b.regions());
    }

    #[test]
    fn region_end_belongs_to_next_region() {
        let regions = parse(SCENARIO);
        let all = regions.regions();
        for pair in all.windows(2) {
            let at = regions.region_at_offset(pair[0].end).unwrap();
            assert_eq!(at, &pair[1]);
        }
        for region in all {
            assert_eq!(regions.region_at_offset(region.start), Some(region));
        }
    }

    #[test]
    fn end_of_document_belongs_to_last_region() {
        let text = "<script>let a";
        let regions = parse(text);
        assert_eq!(regions.language_at_offset(text.len()), Some("javascript"));
        assert_eq!(regions.language_at_offset(text.len() + 1), None);
    }

    #[test]
    fn unclosed_script_on_one_line_stops_at_style() {
        let text = SCENARIO.replace("</script>", "");
        let regions = parse(&text);
        assert_total(&regions);
        let explicit: Vec<_> = regions
            .regions()
            .iter()
            .filter(|r| r.kind != BlockKind::Outer)
            .map(|r| (r.language_id.as_str(), &text[r.span()]))
            .collect();
        assert_eq!(
            explicit,
            vec![
                ("html", "<div>{{ x }}</div>"),
                ("javascript", "let x=1"),
                ("css", ".a{color:red}"),
            ]
        );
        assert_eq!(regions.language_at_offset(text.find("<style>").unwrap()), Some("vue"));
    }

    #[test]
    fn unclosed_script_extends_to_end() {
        let text = "<template></template>\n<script>\nexport default {\n";
        let regions = parse(text);
        assert_total(&regions);
        let script = regions
            .regions()
            .iter()
            .find(|r| r.kind == BlockKind::Script)
            .unwrap();
        assert_eq!(script.end, text.len());
    }

    #[test]
    fn empty_blocks_keep_an_empty_region() {
        let text = "<style></style>";
        let regions = parse(text);
        assert_total(&regions);
        let style = &regions.regions()[1];
        assert!(style.is_empty());
        assert_eq!(regions.language_at_offset(style.start), Some("vue"));
    }

    #[test]
    fn single_region_document_keeps_one_block() {
        let text = "<style>.a{}</style>\n<style>.b{}</style>";
        let regions = parse(text);
        let offset = text.find(".b").unwrap();
        let (doc, region) = regions.single_region_document(offset).unwrap();
        assert_eq!(region.language_id, "css");
        assert_eq!(doc.text().trim(), ".b{}");
        assert_eq!(regions.single_language_document("css").text().split_whitespace().count(), 2);
    }

    #[test]
    fn single_kind_document_spans_languages() {
        let text = "<style>.a{}</style>\n<style lang=\"scss\">.b{}</style>";
        let regions = parse(text);
        let styles = regions.single_kind_document(&BlockKind::Style);
        assert_eq!(styles.language_id(), "css");
        assert_eq!(styles.text().split_whitespace().collect::<Vec<_>>(), vec![".a{}", ".b{}"]);
    }

    #[test]
    fn languages_in_order_of_appearance() {
        let regions = parse(SCENARIO);
        assert_eq!(
            regions.languages_in_document(),
            vec!["vue", "html", "javascript", "css"]
        );
    }

    #[test]
    fn regions_in_span_are_clipped() {
        let regions = parse(SCENARIO);
        let start = SCENARIO.find("let").unwrap();
        let clipped = regions.regions_in_span(start + 1..start + 3);
        assert_eq!(clipped.len(), 1);
        assert_eq!(clipped[0].span(), start + 1..start + 3);
    }

    #[test]
    fn empty_document_has_no_regions() {
        let regions = parse("");
        assert!(regions.regions().is_empty());
        assert_eq!(regions.region_at_offset(0), None);
        assert_eq!(regions.single_language_document("css").text(), "");
    }
}
