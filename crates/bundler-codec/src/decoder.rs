//! Document → graph
//!
//! Decoding runs in two phases over the primary document and every
//! dependency document:
//!
//! 1. allocation: one empty instance per entry, indexed by local iid (per
//!    document) and by uuid (across all documents)
//! 2. fill: field values are decoded; owned references resolve through the
//!    local table, weak references through the uuid table when they record a
//!    uuid and through the local table otherwise
//!
//! Because every instance exists before any field is filled, weak cycles
//! and references into other documents need no special ordering.

use crate::error::{CorruptionError, DecodeError};
use crate::refs;
use bundler_catalog::{FieldDescriptor, FieldKind, RefMode, TypeCatalog};
use bundler_model::{
    Address, ClassName, DependencySet, Document, EncodedValue, Graph, Iid, Instance, InstanceId,
    Uuid, Value, VersionId,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Decoder switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Reject documents whose owned references do not form a tree
    pub verify_structure: bool,
    /// Keep unresolvable weak references as [`Value::Unresolved`]
    pub loose: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            verify_structure: true,
            loose: false,
        }
    }
}

impl DecodeOptions {
    /// Set structure verification
    #[inline]
    #[must_use]
    pub fn with_verify_structure(mut self, verify: bool) -> Self {
        self.verify_structure = verify;
        self
    }

    /// Set loose mode
    #[inline]
    #[must_use]
    pub fn with_loose(mut self, loose: bool) -> Self {
        self.loose = loose;
        self
    }
}

/// Result of a decode
#[derive(Debug, Clone)]
pub struct Decoded {
    /// Every decoded instance, primary document first
    pub graph: Graph,
    /// Root of the primary document
    pub root: InstanceId,
    /// Roots of the dependency documents, in load order
    pub dependency_roots: IndexMap<VersionId, InstanceId>,
    /// Instance decoded from each entry of the primary document
    pub iids: BTreeMap<Iid, InstanceId>,
}

impl Decoded {
    /// Root instance of the primary document
    #[inline]
    #[must_use]
    pub fn root_instance(&self) -> Option<&Instance> {
        self.graph.get(self.root)
    }

    /// Root of a dependency document
    #[inline]
    #[must_use]
    pub fn dependency_root(&self, id: &VersionId) -> Option<InstanceId> {
        self.dependency_roots.get(id).copied()
    }
}

/// Decodes [`Document`]s into live graphs
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'c> {
    catalog: &'c TypeCatalog,
    options: DecodeOptions,
}

impl<'c> Decoder<'c> {
    /// Decoder over `catalog` with default options
    #[inline]
    #[must_use]
    pub fn new(catalog: &'c TypeCatalog) -> Self {
        Self {
            catalog,
            options: DecodeOptions::default(),
        }
    }

    /// Replace options
    #[inline]
    #[must_use]
    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    /// Current options
    #[inline]
    #[must_use]
    pub fn options(&self) -> DecodeOptions {
        self.options
    }

    /// Decode `doc`, resolving external weak references through `deps`
    ///
    /// # Errors
    /// - [`DecodeError::Corruption`] / [`DecodeError::CorruptDependency`] if
    ///   a document violates a structural invariant
    /// - [`DecodeError::UnresolvedDependency`] if a weak reference points
    ///   into a document that was not supplied (strict mode only)
    pub fn decode(&self, doc: &Document, deps: &DependencySet) -> Result<Decoded, DecodeError> {
        let sources: Vec<(Option<&VersionId>, &Document)> = std::iter::once((None, doc))
            .chain(deps.iter().map(|(id, d)| (Some(id), d)))
            .collect();

        if self.options.verify_structure {
            for (id, source) in &sources {
                let violations = refs::check_ownership(source);
                if !violations.is_empty() {
                    return Err(corrupt(*id, CorruptionError::Structure(violations)));
                }
            }
        }

        let mut graph = Graph::new();
        let mut uuids = HashMap::new();
        let mut locals = Vec::with_capacity(sources.len());
        for (index, (id, source)) in sources.iter().enumerate() {
            let local = self
                .allocate(&mut graph, &mut uuids, index, *id, source)
                .map_err(|e| corrupt(*id, e))?;
            locals.push(local);
        }

        let mut fill = FillPass {
            catalog: self.catalog,
            options: self.options,
            uuids: &uuids,
            unresolved: 0,
        };
        for (index, ((id, source), local)) in sources.iter().zip(&locals).enumerate() {
            fill.fill_document(&mut graph, index, *id, source, local)?;
        }

        let root_of = |source: &Document, local: Option<&HashMap<Iid, InstanceId>>| {
            local
                .and_then(|l| l.get(&source.root))
                .copied()
                .ok_or(CorruptionError::MissingRoot(source.root))
        };
        let root = root_of(doc, locals.first())?;
        let mut dependency_roots = IndexMap::with_capacity(deps.len());
        for ((id, source), local) in sources.iter().zip(&locals).skip(1) {
            if let Some(id) = *id {
                let dep_root = root_of(source, Some(local)).map_err(|e| corrupt(Some(id), e))?;
                dependency_roots.insert(id.clone(), dep_root);
            }
        }

        debug!(
            instances = graph.len(),
            entries = doc.len(),
            deps = deps.len(),
            unresolved = fill.unresolved,
            version = %doc.version,
            "document decoded"
        );
        let iids = locals
            .first()
            .map(|local| local.iter().map(|(iid, id)| (*iid, *id)).collect())
            .unwrap_or_default();
        Ok(Decoded {
            graph,
            root,
            dependency_roots,
            iids,
        })
    }

    /// Allocation phase for one document
    fn allocate(
        &self,
        graph: &mut Graph,
        uuids: &mut HashMap<Uuid, UuidSlot>,
        source: usize,
        origin: Option<&VersionId>,
        doc: &Document,
    ) -> Result<HashMap<Iid, InstanceId>, CorruptionError> {
        if !doc.map.contains_key(&doc.root) {
            return Err(CorruptionError::MissingRoot(doc.root));
        }

        let mut local = HashMap::with_capacity(doc.map.len());
        for (key, entry) in &doc.map {
            if *key != entry.iid {
                return Err(CorruptionError::IidMismatch {
                    key: *key,
                    iid: entry.iid,
                });
            }
            let class = self
                .catalog
                .class_name(entry.class.as_str())
                .cloned()
                .ok_or_else(|| CorruptionError::UnknownClass {
                    iid: *key,
                    class: entry.class.clone(),
                })?;

            let mut instance = Instance::new(class);
            if let Some(uuid) = entry.uuid {
                instance = instance.with_uuid(uuid);
            }
            if let Some(origin) = origin {
                instance = instance.with_origin(origin.clone());
            }
            let id = graph.insert(instance);

            if let Some(uuid) = entry.uuid {
                let slot = UuidSlot {
                    id,
                    source,
                    iid: *key,
                };
                if uuids.insert(uuid, slot).is_some() {
                    return Err(CorruptionError::DuplicateUuid { uuid, iid: *key });
                }
            }
            local.insert(*key, id);
        }
        Ok(local)
    }
}

fn corrupt(document: Option<&VersionId>, error: CorruptionError) -> DecodeError {
    match document {
        None => DecodeError::Corruption(error),
        Some(id) => DecodeError::CorruptDependency {
            id: id.clone(),
            source: error,
        },
    }
}

/// Where a uuid was allocated
#[derive(Debug, Clone, Copy)]
struct UuidSlot {
    id: InstanceId,
    /// Index of the defining document, primary = 0
    source: usize,
    iid: Iid,
}

struct FillPass<'a> {
    catalog: &'a TypeCatalog,
    options: DecodeOptions,
    uuids: &'a HashMap<Uuid, UuidSlot>,
    unresolved: usize,
}

/// Where a value is being decoded
struct Site<'a> {
    source: usize,
    document: Option<&'a VersionId>,
    local: &'a HashMap<Iid, InstanceId>,
    owner: Iid,
    field: &'a FieldDescriptor,
}

impl Site<'_> {
    fn corrupt(&self, error: CorruptionError) -> DecodeError {
        corrupt(self.document, error)
    }

    fn mismatch(&self, found: &EncodedValue) -> DecodeError {
        self.corrupt(CorruptionError::ShapeMismatch {
            iid: self.owner,
            field: self.field.name.clone(),
            expected: self.field.kind.name(),
            found: found.kind_name(),
        })
    }
}

impl FillPass<'_> {
    fn fill_document(
        &mut self,
        graph: &mut Graph,
        source: usize,
        document: Option<&VersionId>,
        doc: &Document,
        local: &HashMap<Iid, InstanceId>,
    ) -> Result<(), DecodeError> {
        let catalog = self.catalog;
        for (iid, entry) in &doc.map {
            let Some(&id) = local.get(iid) else {
                continue;
            };
            let fields = catalog.all_fields(entry.class.as_str()).ok_or_else(|| {
                corrupt(
                    document,
                    CorruptionError::UnknownClass {
                        iid: *iid,
                        class: entry.class.clone(),
                    },
                )
            })?;

            for (name, encoded) in &entry.fields {
                let field = fields.iter().find(|f| &f.name == name).ok_or_else(|| {
                    corrupt(document, unknown_field(*iid, &entry.class, name))
                })?;
                if field.transient {
                    debug!(iid = %iid, field = %name, "skipping persisted transient field");
                    continue;
                }
                let site = Site {
                    source,
                    document,
                    local,
                    owner: *iid,
                    field,
                };
                let value = self.decode_field(&site, encoded)?;
                graph.set_field(id, name.clone(), value);
            }

            if let Some(missing) = fields
                .iter()
                .find(|f| f.is_persisted() && !f.optional && !entry.fields.contains_key(&f.name))
            {
                return Err(corrupt(
                    document,
                    CorruptionError::MissingField {
                        iid: *iid,
                        class: entry.class.clone(),
                        field: missing.name.clone(),
                    },
                ));
            }
        }
        Ok(())
    }

    fn decode_field(&mut self, site: &Site<'_>, encoded: &EncodedValue) -> Result<Value, DecodeError> {
        let field = site.field;
        match (field.kind, encoded) {
            (FieldKind::Scalar, v) if v.is_scalar() => decode_scalar(site, v),
            (_, EncodedValue::Null) if field.optional => Ok(Value::Null),
            (FieldKind::OwnedChild, EncodedValue::Ref(r)) => self.owned(site, r.iid),
            (FieldKind::WeakRef, EncodedValue::Weak(addr)) => self.weak(site, addr),
            (FieldKind::List(mode), EncodedValue::List(_))
            | (FieldKind::PlainMap(mode), EncodedValue::Map(_)) => {
                self.decode_nested(site, mode, encoded)
            }
            (_, v) => Err(site.mismatch(v)),
        }
    }

    fn decode_nested(
        &mut self,
        site: &Site<'_>,
        mode: RefMode,
        encoded: &EncodedValue,
    ) -> Result<Value, DecodeError> {
        match (mode, encoded) {
            (_, EncodedValue::List(items)) => items
                .iter()
                .map(|item| self.decode_nested(site, mode, item))
                .collect::<Result<_, _>>()
                .map(Value::List),
            (_, EncodedValue::Map(entries)) => entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), self.decode_nested(site, mode, v)?)))
                .collect::<Result<BTreeMap<_, _>, DecodeError>>()
                .map(Value::Map),
            (RefMode::Owned, EncodedValue::Ref(r)) => self.owned(site, r.iid),
            (RefMode::Weak, EncodedValue::Weak(addr)) => self.weak(site, addr),
            (_, v) if v.is_scalar() => decode_scalar(site, v),
            (_, v) => Err(site.mismatch(v)),
        }
    }

    fn owned(&self, site: &Site<'_>, target: Iid) -> Result<Value, DecodeError> {
        site.local.get(&target).map(|&id| Value::Ref(id)).ok_or_else(|| {
            site.corrupt(CorruptionError::DanglingRef {
                owner: site.owner,
                field: site.field.name.clone(),
                target,
            })
        })
    }

    fn weak(&mut self, site: &Site<'_>, addr: &Address) -> Result<Value, DecodeError> {
        let Some(uuid) = addr.uuid else {
            return site.local.get(&addr.iid_ref).map(|&id| Value::Ref(id)).ok_or_else(|| {
                site.corrupt(CorruptionError::UnaddressableRef {
                    owner: site.owner,
                    field: site.field.name.clone(),
                    target: addr.iid_ref,
                })
            });
        };

        // A recorded uuid is authoritative; the iid is only a hint
        match self.uuids.get(&uuid) {
            Some(slot) if slot.source == site.source && slot.iid != addr.iid_ref => {
                return Err(site.corrupt(CorruptionError::WeakRefMismatch {
                    owner: site.owner,
                    field: site.field.name.clone(),
                    target: addr.iid_ref,
                    uuid,
                    holder: slot.iid,
                }));
            }
            Some(slot) => return Ok(Value::Ref(slot.id)),
            None => {}
        }

        if self.options.loose {
            warn!(
                owner = %site.owner,
                field = %site.field.name,
                uuid = %uuid,
                "leaving weak reference unresolved"
            );
            self.unresolved += 1;
            return Ok(Value::Unresolved(addr.clone()));
        }
        Err(DecodeError::UnresolvedDependency {
            uuid,
            iid_ref: addr.iid_ref,
            owner: site.owner,
            field: site.field.name.clone(),
            document: site.document.cloned(),
        })
    }
}

fn decode_scalar(site: &Site<'_>, encoded: &EncodedValue) -> Result<Value, DecodeError> {
    Ok(match encoded {
        EncodedValue::Null => Value::Null,
        EncodedValue::Bool(b) => Value::Bool(*b),
        EncodedValue::Int(i) => Value::Int(*i),
        EncodedValue::Float(f) => Value::Float(*f),
        EncodedValue::String(s) => Value::String(s.clone()),
        other => return Err(site.mismatch(other)),
    })
}

fn unknown_field(iid: Iid, class: &ClassName, field: &str) -> CorruptionError {
    CorruptionError::UnknownField {
        iid,
        class: class.clone(),
        field: field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;
    use bundler_catalog::ClassDescriptor;
    use bundler_model::EncodedInstance;

    fn catalog() -> TypeCatalog {
        TypeCatalog::builder()
            .class(
                ClassDescriptor::new("Node")
                    .field(FieldDescriptor::scalar("label"))
                    .field(FieldDescriptor::list("children").optional())
                    .field(FieldDescriptor::weak("peer").optional())
                    .field(FieldDescriptor::scalar("scratch").transient().optional()),
            )
            .build()
            .unwrap()
    }

    fn entry(iid: u64, label: &str) -> EncodedInstance {
        let mut e = EncodedInstance::new("Node", Iid(iid));
        e.fields.insert("label".into(), EncodedValue::String(label.into()));
        e
    }

    fn single(e: EncodedInstance) -> Document {
        let mut doc = Document::new("v1", Iid::ROOT);
        doc.map.insert(e.iid, e);
        doc
    }

    #[test]
    fn weak_cycle_resolves_to_same_instances() {
        let catalog = catalog();
        let mut graph = Graph::new();
        let root = graph.insert(Instance::new("Node").with_field("label", "root"));
        let a = graph.insert(Instance::new("Node").with_field("label", "a").with_new_uuid());
        let b = graph.insert(Instance::new("Node").with_field("label", "b").with_new_uuid());
        graph.set_field(root, "children", vec![a, b]);
        graph.set_field(a, "peer", b);
        graph.set_field(b, "peer", a);

        let doc = Encoder::new(&catalog).encode(&graph, root, "v1").unwrap();
        let decoded = Decoder::new(&catalog).decode(&doc, &DependencySet::new()).unwrap();
        let g = &decoded.graph;
        let kids = g.field(decoded.root, "children").and_then(Value::as_list).unwrap();
        let (da, db) = (kids[0].as_ref_id().unwrap(), kids[1].as_ref_id().unwrap());
        assert_eq!(g.follow(da, "peer"), Some(db));
        assert_eq!(g.follow(db, "peer"), Some(da));
    }

    #[test]
    fn unknown_type_is_corruption() {
        let mut e = entry(0, "x");
        e.class = "Ghost".into();
        let err = Decoder::new(&catalog()).decode(&single(e), &DependencySet::new()).unwrap_err();
        assert!(matches!(err, DecodeError::Corruption(CorruptionError::UnknownClass { .. })));
    }

    #[test]
    fn undeclared_and_missing_fields_are_corruption() {
        let catalog = catalog();
        let decoder = Decoder::new(&catalog);

        let mut e = entry(0, "x");
        e.fields.insert("colour".into(), EncodedValue::String("red".into()));
        let err = decoder.decode(&single(e), &DependencySet::new()).unwrap_err();
        assert!(matches!(err, DecodeError::Corruption(CorruptionError::UnknownField { .. })));

        let e = EncodedInstance::new("Node", Iid(0));
        let err = decoder.decode(&single(e), &DependencySet::new()).unwrap_err();
        assert!(matches!(err, DecodeError::Corruption(CorruptionError::MissingField { .. })));
    }

    #[test]
    fn shape_mismatch_is_corruption() {
        let mut e = entry(0, "x");
        e.fields.insert("children".into(), EncodedValue::Int(4));
        let err = Decoder::new(&catalog()).decode(&single(e), &DependencySet::new()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Corruption(CorruptionError::ShapeMismatch { expected: "list", found: "int", .. })
        ));
    }

    #[test]
    fn dangling_owned_ref_is_corruption_even_unverified() {
        let mut e = entry(0, "x");
        e.fields.insert("children".into(), EncodedValue::List(vec![EncodedValue::owned(Iid(3))]));
        let options = DecodeOptions::default().with_verify_structure(false);
        let err = Decoder::new(&catalog())
            .with_options(options)
            .decode(&single(e), &DependencySet::new())
            .unwrap_err();
        assert!(matches!(err, DecodeError::Corruption(CorruptionError::DanglingRef { .. })));
    }

    #[test]
    fn orphans_fail_structure_verification() {
        let mut doc = single(entry(0, "root"));
        doc.map.insert(Iid(1), entry(1, "orphan"));
        let catalog = catalog();

        let err = Decoder::new(&catalog).decode(&doc, &DependencySet::new()).unwrap_err();
        assert!(matches!(err, DecodeError::Corruption(CorruptionError::Structure(_))));

        let relaxed = DecodeOptions::default().with_verify_structure(false);
        let decoded = Decoder::new(&catalog)
            .with_options(relaxed)
            .decode(&doc, &DependencySet::new())
            .unwrap();
        assert_eq!(decoded.graph.len(), 2);
    }

    #[test]
    fn weak_ref_without_uuid_resolves_locally() {
        let mut root = entry(0, "root");
        root.fields.insert("children".into(), EncodedValue::List(vec![EncodedValue::owned(Iid(1))]));
        let mut child = entry(1, "child");
        child.fields.insert("peer".into(), EncodedValue::weak(Iid(0), None));
        let mut doc = single(root);
        doc.map.insert(Iid(1), child);

        let decoded = Decoder::new(&catalog()).decode(&doc, &DependencySet::new()).unwrap();
        let kids = decoded.graph.field(decoded.root, "children").and_then(Value::as_list).unwrap();
        let child = kids[0].as_ref_id().unwrap();
        assert_eq!(decoded.graph.follow(child, "peer"), Some(decoded.root));
    }

    #[test]
    fn unresolved_uuid_is_retryable_or_kept_in_loose_mode() {
        let uuid = Uuid::new_v4();
        let mut e = entry(0, "x");
        e.fields.insert("peer".into(), EncodedValue::weak(Iid(9), Some(uuid)));
        let doc = single(e);
        let catalog = catalog();

        let err = Decoder::new(&catalog).decode(&doc, &DependencySet::new()).unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(
            err,
            DecodeError::UnresolvedDependency { iid_ref: Iid(9), owner: Iid(0), document: None, .. }
        ));

        let decoded = Decoder::new(&catalog)
            .with_options(DecodeOptions::default().with_loose(true))
            .decode(&doc, &DependencySet::new())
            .unwrap();
        assert_eq!(
            decoded.graph.field(decoded.root, "peer"),
            Some(&Value::Unresolved(Address::new(Iid(9), Some(uuid))))
        );
    }

    #[test]
    fn uuid_wins_over_a_local_entry_at_the_same_iid() {
        let uuid = Uuid::new_v4();
        let mut root = entry(0, "root");
        root.fields.insert("children".into(), EncodedValue::List(vec![EncodedValue::owned(Iid(1))]));
        root.fields.insert("peer".into(), EncodedValue::weak(Iid(1), Some(uuid)));
        let mut doc = single(root);
        doc.map.insert(Iid(1), entry(1, "squatter"));
        let catalog = catalog();

        let err = Decoder::new(&catalog).decode(&doc, &DependencySet::new()).unwrap_err();
        assert!(matches!(err, DecodeError::UnresolvedDependency { iid_ref: Iid(1), .. }));

        let mut dep_root = entry(0, "token");
        dep_root.uuid = Some(uuid);
        let deps: DependencySet = [(VersionId::new("pkg@1"), single(dep_root))].into_iter().collect();
        let decoded = Decoder::new(&catalog).decode(&doc, &deps).unwrap();
        let target = decoded.graph.follow(decoded.root, "peer").unwrap();
        assert_eq!(decoded.dependency_root(&"pkg@1".into()), Some(target));
    }

    #[test]
    fn local_uuid_at_another_iid_is_corruption() {
        let uuid = Uuid::new_v4();
        let mut root = entry(0, "root");
        root.fields.insert(
            "children".into(),
            EncodedValue::List(vec![EncodedValue::owned(Iid(1)), EncodedValue::owned(Iid(2))]),
        );
        root.fields.insert("peer".into(), EncodedValue::weak(Iid(2), Some(uuid)));
        let mut first = entry(1, "first");
        first.uuid = Some(uuid);
        let mut doc = single(root);
        doc.map.insert(Iid(1), first);
        doc.map.insert(Iid(2), entry(2, "second"));

        let err = Decoder::new(&catalog()).decode(&doc, &DependencySet::new()).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Corruption(CorruptionError::WeakRefMismatch {
                owner: Iid(0),
                field: "peer".into(),
                target: Iid(2),
                uuid,
                holder: Iid(1),
            })
        );
    }

    #[test]
    fn transient_fields_in_documents_are_ignored() {
        let mut e = entry(0, "x");
        e.fields.insert("scratch".into(), EncodedValue::Int(1));
        let decoded = Decoder::new(&catalog()).decode(&single(e), &DependencySet::new()).unwrap();
        assert!(decoded.graph.field(decoded.root, "scratch").is_none());
    }

    #[test]
    fn duplicate_uuid_is_corruption() {
        let uuid = Uuid::new_v4();
        let mut root = entry(0, "root");
        root.uuid = Some(uuid);
        root.fields.insert("children".into(), EncodedValue::List(vec![EncodedValue::owned(Iid(1))]));
        let mut child = entry(1, "child");
        child.uuid = Some(uuid);
        let mut doc = single(root);
        doc.map.insert(Iid(1), child);

        let err = Decoder::new(&catalog()).decode(&doc, &DependencySet::new()).unwrap_err();
        assert_eq!(err, DecodeError::Corruption(CorruptionError::DuplicateUuid { uuid, iid: Iid(1) }));
    }

    #[test]
    fn dependency_instances_carry_origin() {
        let uuid = Uuid::new_v4();
        let mut dep_root = entry(0, "token");
        dep_root.uuid = Some(uuid);
        let dep = single(dep_root);

        let mut e = entry(0, "x");
        e.fields.insert("peer".into(), EncodedValue::weak(Iid(5), Some(uuid)));
        let doc = single(e);

        let deps: DependencySet = [(VersionId::new("pkg@1"), dep)].into_iter().collect();
        let decoded = Decoder::new(&catalog()).decode(&doc, &deps).unwrap();
        let target = decoded.graph.follow(decoded.root, "peer").unwrap();
        assert_eq!(decoded.dependency_root(&"pkg@1".into()), Some(target));
        assert_eq!(
            decoded.graph.get(target).and_then(Instance::origin),
            Some(&VersionId::new("pkg@1"))
        );
        assert_eq!(decoded.root_instance().and_then(Instance::origin), None);
    }

    #[test]
    fn corrupt_dependency_is_attributed() {
        let mut bad = entry(0, "x");
        bad.class = "Ghost".into();
        let deps: DependencySet = [(VersionId::new("pkg@1"), single(bad))].into_iter().collect();
        let err = Decoder::new(&catalog()).decode(&single(entry(0, "ok")), &deps).unwrap_err();
        assert!(matches!(err, DecodeError::CorruptDependency { ref id, .. } if id.as_str() == "pkg@1"));
        assert!(err.is_corruption());
    }
}
