//! Documents, regions and the caches built on them.
//!
//! This module provides:
//! - `TextDocument` and `LineIndex` for offset <-> LSP position conversion
//! - `DocumentRegions`, the tolerant partition of a document into language regions,
//!   and the virtual single-language documents derived from it
//! - `LanguageModelCache` for memoizing per-document values by version
//! - `DocumentStore` for open documents and the embedded-content provider

mod cache;
mod region;
mod scanner;
mod state;
mod text;
mod virtual_file;

pub use cache::LanguageModelCache;
pub use region::{BlockKind, DocumentRegions, Region};
pub use state::{DocumentStore, COMPONENT_LANGUAGE_ID};
pub use text::{LineIndex, TextDocument};
pub use virtual_file::{
    embedded_content_uri, parse_embedded_content_uri, EmbeddedContentProvider,
    EMBEDDED_CONTENT_SCHEME,
};
