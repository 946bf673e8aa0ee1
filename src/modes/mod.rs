//! Language modes and the router that picks one per region.
//!
//! A [`LanguageMode`] bundles the language features of one embedded
//! language. Every feature has a default that reports "unsupported" (empty
//! result), so a mode implements only what its language offers.
//!
//! [`LanguageModes`] is the registry built once at startup. It resolves the
//! region owning an offset through the shared [`DocumentRegions`] cache and
//! maps its language id to a registered mode.

mod braces;
mod script;
mod style;
mod stylus;
mod template;
mod vue;

use std::collections::HashMap;
use std::sync::Arc;

use tower_lsp::lsp_types::{
    Color, ColorInformation, ColorPresentation, CompletionList, Diagnostic, DocumentHighlight,
    FoldingRange, FormattingOptions, Hover, Location, Position, Range, SymbolInformation,
    SymbolKind, TextEdit, Url,
};

use crate::document::{DocumentRegions, LanguageModelCache, Region, TextDocument};
use crate::settings::Settings;

pub use script::ScriptMode;
pub use style::StyleMode;
pub use stylus::StylusMode;
pub use template::TemplateMode;
pub use vue::VueMode;

/// Language features for one embedded language.
///
/// Methods receive the host document; positions and ranges are in host
/// coordinates, which virtual documents share.
pub trait LanguageMode: Send + Sync {
    fn id(&self) -> &str;

    fn do_validation(&self, _document: &TextDocument) -> Vec<Diagnostic> {
        Vec::new()
    }

    fn do_complete(&self, _document: &TextDocument, _position: Position) -> Option<CompletionList> {
        None
    }

    fn do_hover(&self, _document: &TextDocument, _position: Position) -> Option<Hover> {
        None
    }

    fn find_document_highlight(
        &self,
        _document: &TextDocument,
        _position: Position,
    ) -> Vec<DocumentHighlight> {
        Vec::new()
    }

    fn find_document_symbols(&self, _document: &TextDocument) -> Vec<SymbolInformation> {
        Vec::new()
    }

    fn find_definition(&self, _document: &TextDocument, _position: Position) -> Vec<Location> {
        Vec::new()
    }

    fn find_references(&self, _document: &TextDocument, _position: Position) -> Vec<Location> {
        Vec::new()
    }

    fn find_document_colors(&self, _document: &TextDocument) -> Vec<ColorInformation> {
        Vec::new()
    }

    fn get_color_presentations(
        &self,
        _document: &TextDocument,
        _color: Color,
        _range: Range,
    ) -> Vec<ColorPresentation> {
        Vec::new()
    }

    fn get_folding_ranges(&self, _document: &TextDocument) -> Vec<FoldingRange> {
        Vec::new()
    }

    fn format(
        &self,
        _document: &TextDocument,
        _range: Range,
        _options: &FormattingOptions,
    ) -> Vec<TextEdit> {
        Vec::new()
    }

    /// Drop cached state for a closed document.
    fn on_document_removed(&self, _uri: &Url) {}

    /// Release everything held by the mode.
    fn dispose(&self) {}
}

/// A region together with the mode that handles it.
#[derive(Clone)]
pub struct LanguageModeRange {
    pub region: Region,
    pub range: Range,
    pub mode: Arc<dyn LanguageMode>,
}

impl std::fmt::Debug for LanguageModeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageModeRange")
            .field("region", &self.region)
            .field("range", &self.range)
            .field("mode", &self.mode.id())
            .finish()
    }
}

/// Registry of language modes plus the shared region cache.
pub struct LanguageModes {
    regions: Arc<LanguageModelCache<DocumentRegions>>,
    modes: HashMap<String, Arc<dyn LanguageMode>>,
    /// Registration order, for deterministic fan-out.
    order: Vec<String>,
}

impl LanguageModes {
    /// An empty registry over a region cache.
    pub fn new(regions: Arc<LanguageModelCache<DocumentRegions>>) -> Self {
        Self {
            regions,
            modes: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Build the region cache from settings and register the built-in modes.
    pub fn with_builtin_modes(settings: &Settings) -> Self {
        let blocks = settings.blocks.clone();
        let regions = Arc::new(LanguageModelCache::new(
            settings.cache.max_entries,
            settings.cache.max_age(),
            move |document| DocumentRegions::parse(document, &blocks),
        ));

        let mut modes = Self::new(Arc::clone(&regions));
        modes.register(Arc::new(VueMode::new(
            &settings.blocks.outer,
            settings.completion.scaffold_snippets,
        )));
        modes.register(Arc::new(TemplateMode::new("html", &regions, &settings.cache)));
        for language in ["javascript", "javascriptreact", "typescript", "typescriptreact"] {
            modes.register(Arc::new(ScriptMode::new(language, &regions, &settings.cache)));
        }
        for language in ["css", "scss", "less", "postcss"] {
            modes.register(Arc::new(StyleMode::new(language, &regions, &settings.cache)));
        }
        modes.register(Arc::new(StylusMode::new(&regions, &settings.cache)));
        modes
    }

    /// Register a mode, replacing any mode with the same id.
    pub fn register(&mut self, mode: Arc<dyn LanguageMode>) {
        let id = mode.id().to_string();
        if self.modes.insert(id.clone(), mode).is_none() {
            self.order.push(id);
        }
    }

    pub fn regions_cache(&self) -> &Arc<LanguageModelCache<DocumentRegions>> {
        &self.regions
    }

    /// The (cached) partition of a document.
    pub fn document_regions(&self, document: &TextDocument) -> Arc<DocumentRegions> {
        self.regions.refresh_and_get(document)
    }

    pub fn mode(&self, language_id: &str) -> Option<Arc<dyn LanguageMode>> {
        self.modes.get(language_id).cloned()
    }

    pub fn mode_at_offset(&self, document: &TextDocument, offset: usize) -> Option<Arc<dyn LanguageMode>> {
        let regions = self.document_regions(document);
        let language_id = regions.language_at_offset(offset)?;
        let mode = self.mode(language_id);
        log::trace!(
            "offset {} of {} is {} ({})",
            offset,
            document.uri(),
            language_id,
            if mode.is_some() { "mode" } else { "no mode" }
        );
        mode
    }

    pub fn mode_at_position(
        &self,
        document: &TextDocument,
        position: Position,
    ) -> Option<Arc<dyn LanguageMode>> {
        self.mode_at_offset(document, document.offset_at(position))
    }

    /// Every region with a registered mode, in document order.
    pub fn mode_ranges_in_document(&self, document: &TextDocument) -> Vec<LanguageModeRange> {
        let regions = self.document_regions(document);
        regions
            .regions()
            .iter()
            .filter_map(|region| {
                let mode = self.mode(&region.language_id)?;
                Some(LanguageModeRange {
                    region: region.clone(),
                    range: document.span_to_range(&region.span()),
                    mode,
                })
            })
            .collect()
    }

    /// Each mode present in the document once, by first appearance.
    ///
    /// Modes analyze their whole single-language view, so whole-document
    /// features call each of these once.
    pub fn modes_in_document(&self, document: &TextDocument) -> Vec<Arc<dyn LanguageMode>> {
        let regions = self.document_regions(document);
        regions
            .languages_in_document()
            .into_iter()
            .filter_map(|language_id| self.mode(language_id))
            .collect()
    }

    pub fn all_modes(&self) -> impl Iterator<Item = &Arc<dyn LanguageMode>> + '_ {
        self.order.iter().filter_map(|id| self.modes.get(id))
    }

    /// Forget a closed document in every mode and in the region cache.
    pub fn on_document_removed(&self, uri: &Url) {
        self.regions.on_document_removed(uri);
        for mode in self.all_modes() {
            mode.on_document_removed(uri);
        }
    }

    pub fn dispose(&self) {
        self.regions.dispose();
        for mode in self.all_modes() {
            mode.dispose();
        }
    }
}

/// A flat symbol located in `document`.
#[allow(deprecated)]
pub(crate) fn symbol(
    name: &str,
    kind: SymbolKind,
    document: &TextDocument,
    span: &std::ops::Range<usize>,
) -> SymbolInformation {
    SymbolInformation {
        name: name.to_string(),
        kind,
        tags: None,
        deprecated: None,
        location: Location {
            uri: document.uri().clone(),
            range: document.span_to_range(span),
        },
        container_name: None,
    }
}

/// Cache of one language's virtual document, fed by the region cache.
pub(crate) fn embedded_documents(
    language_id: &str,
    regions: &Arc<LanguageModelCache<DocumentRegions>>,
    cache: &crate::settings::CacheSettings,
) -> LanguageModelCache<TextDocument> {
    let regions = Arc::clone(regions);
    let language_id = language_id.to_string();
    LanguageModelCache::new(cache.max_entries, cache.max_age(), move |document| {
        regions
            .refresh_and_get(document)
            .single_language_document(&language_id)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    struct FakeMode {
        id: &'static str,
        removed: Mutex<Vec<Url>>,
        disposed: AtomicUsize,
    }

    impl FakeMode {
        fn new(id: &'static str) -> Arc<Self> {
            Arc::new(Self {
                id,
                removed: Mutex::new(Vec::new()),
                disposed: AtomicUsize::new(0),
            })
        }
    }

    impl LanguageMode for FakeMode {
        fn id(&self) -> &str {
            self.id
        }

        fn on_document_removed(&self, uri: &Url) {
            self.removed.lock().unwrap().push(uri.clone());
        }

        fn dispose(&self) {
            self.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn doc(text: &str) -> TextDocument {
        TextDocument::new(Url::parse("file:///a.vue").unwrap(), "vue", 1, text)
    }

    fn fake_modes() -> (LanguageModes, Arc<FakeMode>, Arc<FakeMode>) {
        let settings = Settings::default();
        let blocks = settings.blocks.clone();
        let regions = Arc::new(LanguageModelCache::new(10, settings.cache.max_age(), move |d| {
            DocumentRegions::parse(d, &blocks)
        }));
        let mut modes = LanguageModes::new(regions);
        let css = FakeMode::new("css");
        let js = FakeMode::new("javascript");
        modes.register(css.clone());
        modes.register(js.clone());
        (modes, css, js)
    }

    #[test]
    fn mode_at_position_follows_regions() {
        let (modes, _, _) = fake_modes();
        let d = doc("<script>\nlet a\n</script>\n<style>\n.a{}\n</style>");
        let id = |line, character| {
            modes
                .mode_at_position(&d, Position::new(line, character))
                .map(|m| m.id().to_string())
        };
        assert_eq!(id(1, 0).as_deref(), Some("javascript"));
        assert_eq!(id(4, 1).as_deref(), Some("css"));
        // the tags belong to the outer region, which has no mode here
        assert_eq!(id(0, 2), None);
        assert_eq!(id(3, 0), None);
    }

    #[test]
    fn unregistered_language_has_no_mode() {
        let (modes, _, _) = fake_modes();
        let d = doc("<style lang=\"sass\">\n.a\n  color: red\n</style>");
        assert!(modes.mode_at_position(&d, Position::new(1, 1)).is_none());
        assert!(modes.mode_ranges_in_document(&d).is_empty());
    }

    #[test]
    fn mode_ranges_keep_region_order() {
        let (modes, _, _) = fake_modes();
        let d = doc("<style>a</style>\n<script>b</script>\n<style>c</style>");
        let ids: Vec<_> = modes
            .mode_ranges_in_document(&d)
            .iter()
            .map(|r| r.mode.id().to_string())
            .collect();
        assert_eq!(ids, vec!["css", "javascript", "css"]);
        let distinct: Vec<_> = modes
            .modes_in_document(&d)
            .iter()
            .map(|m| m.id().to_string())
            .collect();
        assert_eq!(distinct, vec!["css", "javascript"]);
    }

    #[test]
    fn lifecycle_fans_out_to_every_mode() {
        let (modes, css, js) = fake_modes();
        let d = doc("<style>a</style>");
        modes.document_regions(&d);
        assert_eq!(modes.regions_cache().len(), 1);

        modes.on_document_removed(d.uri());
        assert!(modes.regions_cache().is_empty());
        assert_eq!(css.removed.lock().unwrap().as_slice(), &[d.uri().clone()]);
        assert_eq!(js.removed.lock().unwrap().len(), 1);

        modes.dispose();
        assert_eq!(css.disposed.load(Ordering::SeqCst), 1);
        assert_eq!(js.disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn builtin_registry() {
        let modes = LanguageModes::with_builtin_modes(&Settings::default());
        let ids: Vec<_> = modes.all_modes().map(|m| m.id().to_string()).collect();
        assert_eq!(
            ids,
            vec![
                "vue",
                "html",
                "javascript",
                "javascriptreact",
                "typescript",
                "typescriptreact",
                "css",
                "scss",
                "less",
                "postcss",
                "stylus"
            ]
        );
    }
}
