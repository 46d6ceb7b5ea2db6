//! Context handed to every migration

use crate::error::ContextError;
use bundler_catalog::TypeCatalog;
use bundler_codec::{DecodeOptions, Decoded, Decoder, Encoder};
use bundler_model::{DependencySet, Document, Graph, InstanceId, VersionId};
use std::sync::Arc;

/// What a migration may consult besides the document itself
///
/// Bundled migrations usually ignore it. Structural migrations use the
/// catalog to decode a sub-document, restructure the graph and encode it
/// again.
#[derive(Debug, Clone, Default)]
pub struct MigrationContext {
    catalog: Option<Arc<TypeCatalog>>,
    deps: DependencySet,
    document_id: Option<VersionId>,
}

impl MigrationContext {
    /// Context with no catalog, dependencies or document id
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog for [`decode`](Self::decode) and [`encode`](Self::encode)
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<TypeCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Dependency documents available to structural decodes
    #[must_use]
    pub fn with_deps(mut self, deps: DependencySet) -> Self {
        self.deps = deps;
        self
    }

    /// Id of the document being migrated
    #[must_use]
    pub fn with_document_id(mut self, id: VersionId) -> Self {
        self.document_id = Some(id);
        self
    }

    /// Catalog, if one was supplied
    #[inline]
    #[must_use]
    pub fn catalog(&self) -> Option<&TypeCatalog> {
        self.catalog.as_deref()
    }

    /// Dependency documents visible to this migration
    #[inline]
    #[must_use]
    pub fn deps(&self) -> &DependencySet {
        &self.deps
    }

    /// Id of the document being migrated, when known
    #[inline]
    #[must_use]
    pub fn document_id(&self) -> Option<&VersionId> {
        self.document_id.as_ref()
    }

    /// Decode an untyped sub-document against the catalog
    ///
    /// Loose mode is used: references into dependencies not supplied here
    /// stay unresolved and re-encode verbatim.
    ///
    /// # Errors
    /// Returns error if there is no catalog, or the value is not a decodable
    /// document
    pub fn decode(&self, value: &serde_json::Value) -> Result<Decoded, ContextError> {
        let catalog = self.catalog().ok_or(ContextError::NoCatalog)?;
        let doc = Document::from_value(value.clone())?;
        let decoded = Decoder::new(catalog)
            .with_options(DecodeOptions::default().with_loose(true))
            .decode(&doc, &self.deps)?;
        Ok(decoded)
    }

    /// Encode a graph back to the untyped form
    ///
    /// # Errors
    /// Returns error if there is no catalog or the graph does not encode
    pub fn encode(
        &self,
        graph: &Graph,
        root: InstanceId,
        version: impl Into<String>,
    ) -> Result<serde_json::Value, ContextError> {
        let catalog = self.catalog().ok_or(ContextError::NoCatalog)?;
        let doc = Encoder::new(catalog).encode(graph, root, version)?;
        Ok(doc.to_value()?)
    }
}
