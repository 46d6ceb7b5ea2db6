//! Caching store wrapper using moka

use crate::error::StoreError;
use crate::store::DocumentStore;
use async_trait::async_trait;
use bundler_model::{Document, VersionId};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Read-through cache in front of another store
///
/// Only successful loads are cached; a missing dependency is looked up
/// again next time.
#[derive(Debug, Clone)]
pub struct CachedStore<S> {
    inner: S,
    cache: Cache<VersionId, Arc<Document>>,
}

impl<S: DocumentStore> CachedStore<S> {
    /// Cache up to `max_capacity` documents
    #[must_use]
    pub fn new(inner: S, max_capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::new(max_capacity),
        }
    }

    /// Cache with time-based expiration
    #[must_use]
    pub fn with_ttl(inner: S, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Wrapped store
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Drop a cached document
    pub async fn invalidate(&self, id: &VersionId) {
        self.cache.invalidate(id).await;
    }

    /// Drop every cached document
    #[inline]
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Approximate number of cached documents
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for CachedStore<S> {
    async fn load(&self, id: &VersionId) -> Result<Document, StoreError> {
        if let Some(doc) = self.cache.get(id).await {
            trace!(id = %id, "document cache hit");
            return Ok((*doc).clone());
        }

        let doc = self.inner.load(id).await?;
        self.cache.insert(id.clone(), Arc::new(doc.clone())).await;
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use bundler_model::{EncodedInstance, Iid};

    fn doc() -> Document {
        let mut doc = Document::new("m1", Iid::ROOT);
        doc.map.insert(Iid::ROOT, EncodedInstance::new("Site", Iid::ROOT));
        doc
    }

    #[tokio::test]
    async fn second_load_is_served_from_cache() {
        let inner = Arc::new(MemoryStore::new().with_document("ds@1", doc()));
        let cached = CachedStore::new(Arc::clone(&inner), 16);
        let id = VersionId::new("ds@1");

        assert_eq!(cached.load(&id).await.unwrap(), doc());
        assert_eq!(cached.load(&id).await.unwrap(), doc());
        assert_eq!(inner.load_count(), 1);

        cached.invalidate(&id).await;
        cached.load(&id).await.unwrap();
        assert_eq!(inner.load_count(), 2);
    }

    #[tokio::test]
    async fn misses_are_not_cached() {
        let inner = Arc::new(MemoryStore::new());
        let cached = CachedStore::new(Arc::clone(&inner), 16);
        let id = VersionId::new("ds@1");

        assert!(cached.load(&id).await.is_err());
        inner.insert("ds@1", doc()).await;
        assert_eq!(cached.load(&id).await.unwrap(), doc());
    }
}
