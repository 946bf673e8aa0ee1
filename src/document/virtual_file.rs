//! Read-only content for embedded-region virtual files.
//!
//! Editor tooling can open one language of a component document in its own
//! tab through a URI of the form
//! `embedded-content://<language>/<percent-encoded host uri>.<language>`.
//! The provider decodes the key and serves the single-language view of the
//! open host document.

use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use tower_lsp::lsp_types::Url;

use crate::error::{Error, Result};

use super::{DocumentRegions, DocumentStore, LanguageModelCache};

pub const EMBEDDED_CONTENT_SCHEME: &str = "embedded-content";

/// Build the virtual-file URI for one language of a host document.
pub fn embedded_content_uri(uri: &Url, language_id: &str) -> String {
    let encoded = utf8_percent_encode(uri.as_str(), NON_ALPHANUMERIC);
    format!("{EMBEDDED_CONTENT_SCHEME}://{language_id}/{encoded}.{language_id}")
}

/// Decode a virtual-file URI into the host URI and language id.
pub fn parse_embedded_content_uri(key: &str) -> Result<(Url, String)> {
    let invalid = || Error::invalid_embedded_uri(key);

    let rest = key
        .strip_prefix(EMBEDDED_CONTENT_SCHEME)
        .and_then(|r| r.strip_prefix("://"))
        .ok_or_else(invalid)?;
    let (language_id, encoded) = rest.split_once('/').ok_or_else(invalid)?;
    if language_id.is_empty() {
        return Err(invalid());
    }
    let encoded = encoded
        .strip_suffix(language_id)
        .and_then(|e| e.strip_suffix('.'))
        .ok_or_else(invalid)?;
    let decoded = percent_decode_str(encoded)
        .decode_utf8()
        .map_err(|_| invalid())?;
    let uri = Url::parse(&decoded).map_err(|_| invalid())?;
    Ok((uri, language_id.to_string()))
}

/// In-process lookup of virtual-file contents.
pub struct EmbeddedContentProvider<'a> {
    documents: &'a DocumentStore,
    regions: &'a LanguageModelCache<DocumentRegions>,
}

impl<'a> EmbeddedContentProvider<'a> {
    pub fn new(documents: &'a DocumentStore, regions: &'a LanguageModelCache<DocumentRegions>) -> Self {
        Self { documents, regions }
    }

    pub fn provide(&self, key: &str) -> Result<String> {
        let (uri, language_id) = parse_embedded_content_uri(key)?;
        let document = self
            .documents
            .get(&uri)
            .ok_or_else(|| Error::DocumentNotFound {
                uri: uri.to_string(),
            })?;
        let regions = self.regions.refresh_and_get(&document);
        Ok(regions
            .single_language_document(&language_id)
            .text()
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::settings::BlockSettings;

    #[test]
    fn uri_round_trips_through_key() {
        let host = Url::parse("file:///work/My%20App/App.vue").unwrap();
        let key = embedded_content_uri(&host, "css");
        assert!(key.starts_with("embedded-content://css/file%3A%2F%2F%2F"));
        assert!(key.ends_with(".css"));
        let (uri, language) = parse_embedded_content_uri(&key).unwrap();
        assert_eq!(uri, host);
        assert_eq!(language, "css");
    }

    #[test]
    fn rejects_malformed_keys() {
        for key in [
            "file:///a.vue",
            "embedded-content://css",
            "embedded-content://css/file%3A%2F%2F%2Fa.scss",
            "embedded-content:///file%3A%2F%2F%2Fa.",
            "embedded-content://css/not%20a%20uri.css",
        ] {
            assert!(parse_embedded_content_uri(key).is_err(), "{key}");
        }
    }

    #[test]
    fn provides_single_language_text() {
        let documents = DocumentStore::new();
        let regions = LanguageModelCache::new(10, Duration::from_secs(60), |d| {
            DocumentRegions::parse(d, &BlockSettings::default())
        });
        let host = Url::parse("file:///a.vue").unwrap();
        documents.open(
            host.clone(),
            "vue",
            "<script>a</script>\n<style>.b{}</style>".to_string(),
            1,
        );
        let provider = EmbeddedContentProvider::new(&documents, &regions);
        let css = provider.provide(&embedded_content_uri(&host, "css")).unwrap();
        assert_eq!(css.trim(), ".b{}");

        let missing = Url::parse("file:///missing.vue").unwrap();
        assert!(matches!(
            provider.provide(&embedded_content_uri(&missing, "css")),
            Err(Error::DocumentNotFound { .. })
        ));
    }
}
