//! Language server for single-file component documents.
//!
//! A component file holds several languages in top-level blocks. Each
//! request is answered by partitioning the document into regions, routing
//! to the language mode of the region at the cursor, and letting that mode
//! work on a virtual single-language view with the host's line layout.

use std::sync::OnceLock;

use serde::Deserialize;
use tower_lsp::jsonrpc::{self, Result};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService};

pub mod document;
mod error;
pub mod lsp;
pub mod modes;
pub mod settings;

pub use document::{
    embedded_content_uri, parse_embedded_content_uri, BlockKind, DocumentRegions, DocumentStore,
    EmbeddedContentProvider, LanguageModelCache, LineIndex, Region, TextDocument,
};
pub use error::Error;
pub use modes::{LanguageMode, LanguageModeRange, LanguageModes};
pub use settings::{discover_settings, load_settings, parse_settings, Settings};

/// Custom request serving the text of an embedded-content URI.
pub const EMBEDDED_CONTENT_METHOD: &str = "sfc/embeddedContent";

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddedContentParams {
    /// An `embedded-content://` URI.
    pub uri: String,
}

/// Settings and the mode registry built from them.
struct Workspace {
    settings: Settings,
    modes: LanguageModes,
}

impl Workspace {
    fn new(settings: Settings) -> Self {
        let modes = LanguageModes::with_builtin_modes(&settings);
        Self { settings, modes }
    }
}

pub struct Backend {
    client: Client,
    documents: DocumentStore,
    workspace: OnceLock<Workspace>,
}

impl Backend {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            documents: DocumentStore::new(),
            workspace: OnceLock::new(),
        }
    }

    /// Requests before `initialize` get the default settings.
    fn workspace(&self) -> &Workspace {
        self.workspace
            .get_or_init(|| Workspace::new(Settings::default()))
    }

    fn modes(&self) -> &LanguageModes {
        &self.workspace().modes
    }

    /// Validate every region and publish the diagnostics.
    async fn publish_diagnostics_for(&self, document: &TextDocument) {
        let diagnostics = lsp::validate_document(self.modes(), document);
        self.client
            .publish_diagnostics(
                document.uri().clone(),
                diagnostics,
                Some(document.version()),
            )
            .await;
    }

    /// Handler for [`EMBEDDED_CONTENT_METHOD`].
    pub async fn embedded_content(&self, params: EmbeddedContentParams) -> Result<Option<String>> {
        let provider =
            EmbeddedContentProvider::new(&self.documents, self.modes().regions_cache());
        match provider.provide(&params.uri) {
            Ok(text) => Ok(Some(text)),
            Err(Error::DocumentNotFound { uri }) => {
                log::debug!("embedded content requested for closed document {}", uri);
                Ok(None)
            }
            Err(e) => Err(jsonrpc::Error::invalid_params(e.to_string())),
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let workspace_root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|f| f.uri.to_file_path().ok())
            .or_else(|| {
                #[allow(deprecated)]
                params.root_uri.as_ref()?.to_file_path().ok()
            });

        let settings = match workspace_root {
            Some(root) => {
                let (settings, settings_dir) = settings::discover_settings(&root);
                log::info!(
                    "workspace {} (settings from {})",
                    root.display(),
                    settings_dir.display()
                );
                settings
            }
            None => Settings::default(),
        };
        if self.workspace.set(Workspace::new(settings)).is_err() {
            log::warn!("initialize received after the workspace was built; keeping it");
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(
                        [".", "<", "/", "@", "\"", "'"]
                            .into_iter()
                            .map(String::from)
                            .collect(),
                    ),
                    resolve_provider: Some(false),
                    ..Default::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                document_highlight_provider: Some(OneOf::Left(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                color_provider: Some(ColorProviderCapability::Simple(true)),
                folding_range_provider: Some(FoldingRangeProviderCapability::Simple(true)),
                document_formatting_provider: Some(OneOf::Left(true)),
                document_range_formatting_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "component language server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        self.modes().dispose();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let item = params.text_document;
        let document = self
            .documents
            .open(item.uri, &item.language_id, item.text, item.version);
        self.publish_diagnostics_for(&document).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // We use FULL sync, so there's exactly one change with the full text
        if let Some(change) = params.content_changes.into_iter().next() {
            let document = self.documents.update(
                params.text_document.uri,
                change.text,
                params.text_document.version,
            );
            self.publish_diagnostics_for(&document).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.close(&uri);
        self.modes().on_document_removed(&uri);
        // Clear diagnostics
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = &params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        let Some(document) = self.documents.get(uri) else {
            log::debug!("completion for unknown document {}", uri);
            return Ok(None);
        };
        let workspace = self.workspace();
        Ok(lsp::completion_at_position(
            &workspace.modes,
            &document,
            position,
            workspace.settings.completion.this_completion,
        ))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let Some(document) = self.documents.get(uri) else {
            return Ok(None);
        };
        Ok(lsp::hover_at_position(self.modes(), &document, position))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let Some(document) = self.documents.get(uri) else {
            return Ok(None);
        };
        let locations = lsp::definition_at_position(self.modes(), &document, position);
        Ok(non_empty(locations).map(GotoDefinitionResponse::Array))
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let uri = &params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        let Some(document) = self.documents.get(uri) else {
            return Ok(None);
        };
        Ok(non_empty(lsp::references_at_position(
            self.modes(),
            &document,
            position,
        )))
    }

    async fn document_highlight(
        &self,
        params: DocumentHighlightParams,
    ) -> Result<Option<Vec<DocumentHighlight>>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let Some(document) = self.documents.get(uri) else {
            return Ok(None);
        };
        Ok(non_empty(lsp::highlights_at_position(
            self.modes(),
            &document,
            position,
        )))
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let Some(document) = self.documents.get(&params.text_document.uri) else {
            return Ok(None);
        };
        let symbols = lsp::collect_symbols(self.modes(), &document);
        Ok(non_empty(symbols).map(DocumentSymbolResponse::Flat))
    }

    async fn document_color(&self, params: DocumentColorParams) -> Result<Vec<ColorInformation>> {
        let Some(document) = self.documents.get(&params.text_document.uri) else {
            return Ok(Vec::new());
        };
        Ok(lsp::document_colors(self.modes(), &document))
    }

    async fn color_presentation(
        &self,
        params: ColorPresentationParams,
    ) -> Result<Vec<ColorPresentation>> {
        let Some(document) = self.documents.get(&params.text_document.uri) else {
            return Ok(Vec::new());
        };
        Ok(lsp::color_presentations(
            self.modes(),
            &document,
            params.color,
            params.range,
        ))
    }

    async fn folding_range(&self, params: FoldingRangeParams) -> Result<Option<Vec<FoldingRange>>> {
        let Some(document) = self.documents.get(&params.text_document.uri) else {
            return Ok(None);
        };
        Ok(non_empty(lsp::folding_ranges(self.modes(), &document)))
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> Result<Option<Vec<TextEdit>>> {
        let Some(document) = self.documents.get(&params.text_document.uri) else {
            return Ok(None);
        };
        Ok(non_empty(lsp::format_document(
            self.modes(),
            &document,
            None,
            &params.options,
        )))
    }

    async fn range_formatting(
        &self,
        params: DocumentRangeFormattingParams,
    ) -> Result<Option<Vec<TextEdit>>> {
        let Some(document) = self.documents.get(&params.text_document.uri) else {
            return Ok(None);
        };
        Ok(non_empty(lsp::format_document(
            self.modes(),
            &document,
            Some(params.range),
            &params.options,
        )))
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

pub fn create_service() -> (LspService<Backend>, tower_lsp::ClientSocket) {
    LspService::build(Backend::new)
        .custom_method(EMBEDDED_CONTENT_METHOD, Backend::embedded_content)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_can_be_created() {
        let (_service, _socket) = create_service();
    }

    #[test]
    fn non_empty_maps_empty_to_none() {
        assert_eq!(non_empty(Vec::<u8>::new()), None);
        assert_eq!(non_empty(vec![1]), Some(vec![1]));
    }
}
