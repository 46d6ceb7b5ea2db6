//! Dependency resolution
//!
//! Discovery is breadth-first: every round fetches the whole frontier
//! concurrently, then queues the dependencies those documents declare.
//! Each version id is fetched once no matter how many documents list it.
//! The result is ordered leaves-first, so a dependency always precedes
//! the documents that depend on it.
//!
//! Migration runs after discovery, in that same leaves-first order: every
//! document is migrated with its own transitive dependencies, already
//! migrated, visible through the [`MigrationContext`].

use crate::error::ResolveError;
use crate::store::DocumentStore;
use bundler_migrate::{migrate_to_latest, MigrationChain, MigrationContext};
use bundler_model::{DependencySet, Document, VersionId};
use futures::stream::{self, StreamExt};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Resolver tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Upper bound on concurrent store loads
    pub max_concurrent_fetches: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 8,
        }
    }
}

impl ResolverConfig {
    /// Set the fetch concurrency, at least 1
    #[must_use]
    pub fn with_max_concurrent_fetches(mut self, n: usize) -> Self {
        self.max_concurrent_fetches = n.max(1);
        self
    }
}

/// Fetches the transitive dependencies of documents from a store
#[derive(Debug)]
pub struct Resolver<S> {
    store: S,
    config: ResolverConfig,
    migrations: Option<(Arc<MigrationChain>, MigrationContext)>,
}

impl<S: DocumentStore> Resolver<S> {
    /// Resolver over `store` with default config
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: ResolverConfig::default(),
            migrations: None,
        }
    }

    /// Replace the tuning
    #[must_use]
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Migrate every loaded document to the chain's latest version
    #[must_use]
    pub fn with_migrations(mut self, chain: Arc<MigrationChain>, ctx: MigrationContext) -> Self {
        self.migrations = Some((chain, ctx));
        self
    }

    /// Current tuning
    #[inline]
    #[must_use]
    pub fn config(&self) -> ResolverConfig {
        self.config
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load `id` and all of its dependencies
    ///
    /// # Errors
    /// Same as [`resolve_dependencies`](Self::resolve_dependencies), with
    /// `id` itself reported as a missing top-level dependency
    pub async fn load(&self, id: &VersionId) -> Result<(Document, DependencySet), ResolveError> {
        let doc = self
            .store
            .load(id)
            .await
            .map_err(|e| ResolveError::from_store(e, None))?;
        let deps = self.resolve_dependencies(&doc).await?;
        // The root comes last: everything it depends on is migrated by now
        let doc = self.prepare(id, doc, &deps)?;
        Ok((doc, deps))
    }

    /// Every document `doc` transitively depends on, leaves first
    ///
    /// # Errors
    /// - [`ResolveError::MissingDependency`] / [`ResolveError::Unavailable`]
    ///   if the store cannot supply a dependency (retryable)
    /// - [`ResolveError::Corrupt`] if a stored dependency is not a document
    /// - [`ResolveError::Cycle`] if dependencies depend on each other
    /// - [`ResolveError::Migration`] if a dependency fails to migrate
    pub async fn resolve_dependencies(&self, doc: &Document) -> Result<DependencySet, ResolveError> {
        let mut graph: DiGraph<VersionId, ()> = DiGraph::new();
        let mut nodes: HashMap<VersionId, NodeIndex> = HashMap::new();
        let mut documents: HashMap<VersionId, Document> = HashMap::new();
        let mut seen: HashSet<VersionId> = doc.deps.iter().cloned().collect();
        let mut frontier: Vec<(VersionId, Option<VersionId>)> =
            seen.iter().map(|id| (id.clone(), None)).collect();
        frontier.sort();
        let mut rounds = 0usize;

        while !frontier.is_empty() {
            rounds += 1;
            let batch = std::mem::take(&mut frontier);
            debug!(round = rounds, fetches = batch.len(), "fetching dependencies");

            // Sorted by id so the graph, and the final order, do not depend
            // on which fetch finished first
            let fetched: BTreeMap<VersionId, _> = stream::iter(batch)
                .map(|(id, required_by)| async move {
                    let result = self.store.load(&id).await;
                    (id, (required_by, result))
                })
                .buffer_unordered(self.config.max_concurrent_fetches.max(1))
                .collect()
                .await;

            for (id, (required_by, result)) in fetched {
                let loaded = result.map_err(|e| ResolveError::from_store(e, required_by))?;

                let node = node_for(&mut graph, &mut nodes, &id);
                for dep in &loaded.deps {
                    let dep_node = node_for(&mut graph, &mut nodes, dep);
                    graph.update_edge(node, dep_node, ());
                    if seen.insert(dep.clone()) {
                        frontier.push((dep.clone(), Some(id.clone())));
                    }
                }
                documents.insert(id, loaded);
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| {
            ResolveError::Cycle(graph[cycle.node_id()].clone())
        })?;

        let mut deps = DependencySet::new();
        for node in order.into_iter().rev() {
            let id = &graph[node];
            let Some(document) = documents.remove(id) else {
                continue;
            };
            let document = if self.migrations.is_some() {
                let below = transitive_deps(&graph, node, &deps);
                self.prepare(id, document, &below)?
            } else {
                document
            };
            deps.insert(id.clone(), document);
        }

        info!(
            direct = doc.deps.len(),
            total = deps.len(),
            rounds,
            "dependencies resolved"
        );
        Ok(deps)
    }

    /// Migrate a loaded document if a chain is configured
    ///
    /// `below` holds the document's migrated transitive dependencies; they
    /// are added to whatever the configured context already supplies.
    fn prepare(
        &self,
        id: &VersionId,
        doc: Document,
        below: &DependencySet,
    ) -> Result<Document, ResolveError> {
        let Some((chain, ctx)) = &self.migrations else {
            return Ok(doc);
        };
        let mut visible = ctx.deps().clone();
        for (dep, document) in below.iter() {
            visible.insert(dep.clone(), document.clone());
        }
        let ctx = ctx
            .clone()
            .with_deps(visible)
            .with_document_id(id.clone());
        migrate_to_latest(&doc, chain, &ctx).map_err(|source| ResolveError::Migration {
            id: id.clone(),
            source,
        })
    }
}

/// Entries of `resolved` that `node` reaches, in `resolved`'s order
fn transitive_deps(
    graph: &DiGraph<VersionId, ()>,
    node: NodeIndex,
    resolved: &DependencySet,
) -> DependencySet {
    let mut reachable = HashSet::new();
    let mut dfs = Dfs::new(graph, node);
    while let Some(next) = dfs.next(graph) {
        if next != node {
            reachable.insert(&graph[next]);
        }
    }
    resolved
        .iter()
        .filter(|(id, _)| reachable.contains(id))
        .map(|(id, document)| (id.clone(), document.clone()))
        .collect()
}

fn node_for(
    graph: &mut DiGraph<VersionId, ()>,
    nodes: &mut HashMap<VersionId, NodeIndex>,
    id: &VersionId,
) -> NodeIndex {
    *nodes
        .entry(id.clone())
        .or_insert_with(|| graph.add_node(id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use bundler_model::{EncodedInstance, Iid};
    use pretty_assertions::assert_eq;

    fn doc(deps: &[&str]) -> Document {
        let mut doc = Document::new("m1", Iid::ROOT);
        doc.map.insert(Iid::ROOT, EncodedInstance::new("Site", Iid::ROOT));
        doc.deps = deps.iter().map(|d| VersionId::new(*d)).collect();
        doc
    }

    fn ids(deps: &DependencySet) -> Vec<&str> {
        deps.ids().map(VersionId::as_str).collect()
    }

    /// app → {ui, icons}; ui → {tokens, icons}; icons → tokens
    fn diamond() -> MemoryStore {
        MemoryStore::new()
            .with_document("ui@2", doc(&["tokens@1", "icons@4"]))
            .with_document("icons@4", doc(&["tokens@1"]))
            .with_document("tokens@1", doc(&[]))
    }

    #[tokio::test]
    async fn dependencies_come_leaves_first() {
        let resolver = Resolver::new(diamond());
        let deps = resolver
            .resolve_dependencies(&doc(&["ui@2", "icons@4"]))
            .await
            .unwrap();
        assert_eq!(ids(&deps), vec!["tokens@1", "icons@4", "ui@2"]);
    }

    #[tokio::test]
    async fn shared_dependencies_are_fetched_once() {
        let resolver = Resolver::new(diamond());
        resolver
            .resolve_dependencies(&doc(&["ui@2", "icons@4"]))
            .await
            .unwrap();
        assert_eq!(resolver.store().load_count(), 3);
    }

    #[tokio::test]
    async fn no_dependencies_means_no_fetches() {
        let resolver = Resolver::new(diamond());
        let deps = resolver.resolve_dependencies(&doc(&[])).await.unwrap();
        assert!(deps.is_empty());
        assert_eq!(resolver.store().load_count(), 0);
    }

    #[tokio::test]
    async fn transitive_miss_names_the_requirer() {
        let store = MemoryStore::new().with_document("ui@2", doc(&["tokens@1"]));
        let err = Resolver::new(store)
            .resolve_dependencies(&doc(&["ui@2"]))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        match err {
            ResolveError::MissingDependency { id, required_by } => {
                assert_eq!(id, VersionId::new("tokens@1"));
                assert_eq!(required_by, Some(VersionId::new("ui@2")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn cycles_are_reported() {
        let store = MemoryStore::new()
            .with_document("a@1", doc(&["b@1"]))
            .with_document("b@1", doc(&["a@1"]));
        let err = Resolver::new(store)
            .resolve_dependencies(&doc(&["a@1"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Cycle(_)));
        assert!(err.is_corruption());
    }

    type Seen = Arc<std::sync::Mutex<Vec<(String, String)>>>;

    /// Chain m1 → m2 whose step records the document id and visible deps
    fn recording_chain() -> (Arc<MigrationChain>, Seen) {
        let seen: Seen = Arc::default();
        let log = Arc::clone(&seen);
        let chain = MigrationChain::new("m1")
            .with(bundler_migrate::Migration::structural("m2", move |doc, ctx| {
                let id = ctx.document_id().map(ToString::to_string).unwrap_or_default();
                let visible: Vec<&str> = ctx.deps().ids().map(VersionId::as_str).collect();
                log.lock().map_err(|e| e.to_string())?.push((id, visible.join(",")));
                Ok(doc)
            }))
            .unwrap();
        (Arc::new(chain), seen)
    }

    fn calls(seen: &Seen) -> Vec<(String, String)> {
        seen.lock().unwrap().clone()
    }

    fn expected(entries: &[(&str, &str)]) -> Vec<(String, String)> {
        entries
            .iter()
            .map(|(id, deps)| (id.to_string(), deps.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn migrations_run_leaves_first_with_transitive_deps() {
        let (chain, seen) = recording_chain();
        let resolver = Resolver::new(diamond().with_document("app@9", doc(&["ui@2"])))
            .with_migrations(chain, MigrationContext::new());

        let (root, deps) = resolver.load(&VersionId::new("app@9")).await.unwrap();
        assert_eq!(root.version, "m2");
        assert!(deps.iter().all(|(_, d)| d.version == "m2"));
        assert_eq!(
            calls(&seen),
            expected(&[
                ("tokens@1", ""),
                ("icons@4", "tokens@1"),
                ("ui@2", "tokens@1,icons@4"),
                ("app@9", "tokens@1,icons@4,ui@2"),
            ])
        );
    }

    #[tokio::test]
    async fn migration_sees_only_its_own_subtree() {
        let (chain, seen) = recording_chain();
        let store = MemoryStore::new()
            .with_document("ui@2", doc(&["tokens@1"]))
            .with_document("tokens@1", doc(&[]))
            .with_document("icons@4", doc(&[]));
        let resolver = Resolver::new(store).with_migrations(chain, MigrationContext::new());

        resolver
            .resolve_dependencies(&doc(&["ui@2", "icons@4"]))
            .await
            .unwrap();
        let mut calls = calls(&seen);
        calls.sort();
        assert_eq!(
            calls,
            expected(&[("icons@4", ""), ("tokens@1", ""), ("ui@2", "tokens@1")])
        );
    }

    #[tokio::test]
    async fn load_fetches_root_then_dependencies() {
        let resolver = Resolver::new(diamond().with_document("app@9", doc(&["ui@2"])))
            .with_config(ResolverConfig::default().with_max_concurrent_fetches(1));
        let (root, deps) = resolver.load(&VersionId::new("app@9")).await.unwrap();
        assert_eq!(root.deps, vec![VersionId::new("ui@2")]);
        assert_eq!(ids(&deps), vec!["tokens@1", "icons@4", "ui@2"]);
    }
}
