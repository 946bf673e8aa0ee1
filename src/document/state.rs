//! Open document storage.

use std::sync::Arc;

use dashmap::DashMap;
use tower_lsp::lsp_types::Url;

use super::text::TextDocument;

/// Language id given to documents opened without one.
pub const COMPONENT_LANGUAGE_ID: &str = "vue";

/// Thread-safe storage for open documents.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: DashMap<Url, Arc<TextDocument>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    /// Open or replace a document with a new version of its text.
    pub fn open(&self, uri: Url, language_id: &str, text: String, version: i32) -> Arc<TextDocument> {
        let language_id = if language_id.is_empty() {
            COMPONENT_LANGUAGE_ID
        } else {
            language_id
        };
        let document = Arc::new(TextDocument::new(uri.clone(), language_id, version, text));
        self.documents.insert(uri, Arc::clone(&document));
        document
    }

    /// Replace the text of an open document, keeping its language id.
    pub fn update(&self, uri: Url, text: String, version: i32) -> Arc<TextDocument> {
        let language_id = self
            .documents
            .get(&uri)
            .map(|d| d.language_id().to_string())
            .unwrap_or_else(|| COMPONENT_LANGUAGE_ID.to_string());
        self.open(uri, &language_id, text, version)
    }

    pub fn close(&self, uri: &Url) -> Option<Arc<TextDocument>> {
        self.documents.remove(uri).map(|(_, d)| d)
    }

    pub fn get(&self, uri: &Url) -> Option<Arc<TextDocument>> {
        self.documents.get(uri).map(|r| Arc::clone(&r))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
