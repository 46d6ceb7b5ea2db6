//! Document stores
//!
//! A store maps version ids to documents. Documents are immutable per id,
//! so any store may be cached freely (see [`CachedStore`](crate::CachedStore)).

use crate::error::StoreError;
use async_trait::async_trait;
use bundler_model::{Document, VersionId};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Source of dependency documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load the document stored under `id`
    async fn load(&self, id: &VersionId) -> Result<Document, StoreError>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    async fn load(&self, id: &VersionId) -> Result<Document, StoreError> {
        (**self).load(id).await
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<VersionId, Document>>,
    loads: AtomicUsize,
}

impl MemoryStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert)
    #[must_use]
    pub fn with_document(mut self, id: impl Into<VersionId>, doc: Document) -> Self {
        self.documents.get_mut().insert(id.into(), doc);
        self
    }

    /// Store `doc` under `id`, replacing any previous document
    pub async fn insert(&self, id: impl Into<VersionId>, doc: Document) {
        self.documents.write().await.insert(id.into(), doc);
    }

    /// Number of documents stored
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// True if nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Number of `load` calls served so far, hits and misses alike
    #[inline]
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self, id: &VersionId) -> Result<Document, StoreError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        self.documents
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}

/// Directory of `<version id>.json` files
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Store rooted at `root`; the directory need not exist yet
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the documents
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `id`
    ///
    /// # Errors
    /// Returns error if the id cannot be used as a file name
    pub fn path_for(&self, id: &VersionId) -> Result<PathBuf, StoreError> {
        let name = id.as_str();
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(StoreError::Invalid {
                id: id.clone(),
                reason: "version id is not a valid file name".into(),
            });
        }
        Ok(self.root.join(format!("{name}.json")))
    }

    /// Write `doc` under `id`, creating the directory if needed
    ///
    /// # Errors
    /// Returns error if the id is unusable, or the file cannot be written
    pub async fn save(&self, id: &VersionId, doc: &Document) -> Result<(), StoreError> {
        let path = self.path_for(id)?;
        let json = doc.to_json_pretty().map_err(|e| StoreError::Invalid {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        let unavailable = |e: std::io::Error| StoreError::Unavailable {
            id: id.clone(),
            reason: e.to_string(),
        };
        tokio::fs::create_dir_all(&self.root).await.map_err(unavailable)?;
        tokio::fs::write(&path, json).await.map_err(unavailable)?;
        debug!(id = %id, path = %path.display(), "document saved");
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FsStore {
    async fn load(&self, id: &VersionId) -> Result<Document, StoreError> {
        let path = self.path_for(id)?;
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.clone()))
            }
            Err(e) => {
                return Err(StoreError::Unavailable {
                    id: id.clone(),
                    reason: e.to_string(),
                })
            }
        };
        Document::from_json_str(&json).map_err(|e| StoreError::Invalid {
            id: id.clone(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundler_model::{EncodedInstance, Iid};
    use pretty_assertions::assert_eq;

    fn doc(version: &str) -> Document {
        let mut doc = Document::new(version, Iid::ROOT);
        doc.map.insert(Iid::ROOT, EncodedInstance::new("Site", Iid::ROOT));
        doc
    }

    #[tokio::test]
    async fn memory_store_serves_inserted_documents() {
        let store = MemoryStore::new().with_document("ds@1", doc("m1"));
        store.insert("ds@2", doc("m2")).await;

        assert_eq!(store.load(&VersionId::new("ds@2")).await.unwrap(), doc("m2"));
        assert_eq!(
            store.load(&VersionId::new("ds@9")).await.unwrap_err(),
            StoreError::NotFound(VersionId::new("ds@9"))
        );
        assert_eq!(store.len().await, 2);
        assert_eq!(store.load_count(), 2);
    }

    #[tokio::test]
    async fn fs_store_round_trips_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().join("deps"));
        let id = VersionId::new("ds@1");

        store.save(&id, &doc("m1")).await.unwrap();
        assert!(dir.path().join("deps/ds@1.json").exists());
        assert_eq!(store.load(&id).await.unwrap(), doc("m1"));
    }

    #[tokio::test]
    async fn fs_store_classifies_failures() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        let missing = VersionId::new("nope@1");
        assert_eq!(store.load(&missing).await.unwrap_err(), StoreError::NotFound(missing));

        tokio::fs::write(dir.path().join("bad@1.json"), "{not json").await.unwrap();
        let err = store.load(&VersionId::new("bad@1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn path_traversal_is_rejected() {
        let store = FsStore::new("/tmp/store");
        assert!(store.path_for(&VersionId::new("../etc/passwd")).is_err());
        assert!(store.path_for(&VersionId::new(".hidden")).is_err());
        assert_eq!(
            store.path_for(&VersionId::new("ds@1")).unwrap(),
            PathBuf::from("/tmp/store/ds@1.json")
        );
    }
}
