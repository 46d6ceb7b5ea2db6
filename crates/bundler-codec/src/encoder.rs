//! Graph → document
//!
//! Iids are assigned in walk order (root = 0, depth-first, field declaration
//! order), then to weak-only targets in order of first encounter. Nothing
//! else feeds into the output, so encoding an unchanged graph twice yields
//! byte-identical documents.

use crate::error::{EncodeError, WalkError};
use crate::walker::GraphWalker;
use bundler_catalog::{FieldDescriptor, FieldKind, RefMode, TypeCatalog};
use bundler_model::{
    Document, EncodedInstance, EncodedValue, Graph, Iid, InstanceId, Value, VersionId,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Encodes live graphs into [`Document`]s
#[derive(Debug, Clone, Copy)]
pub struct Encoder<'c> {
    catalog: &'c TypeCatalog,
}

impl<'c> Encoder<'c> {
    /// Encoder over `catalog`
    #[inline]
    #[must_use]
    pub fn new(catalog: &'c TypeCatalog) -> Self {
        Self { catalog }
    }

    /// Encode everything owned by `root`, stamping `version`
    ///
    /// # Errors
    /// Returns error if the graph does not match the catalog, or a weak
    /// reference leaves the ownership tree towards an instance with no uuid
    pub fn encode(
        &self,
        graph: &Graph,
        root: InstanceId,
        version: impl Into<String>,
    ) -> Result<Document, EncodeError> {
        self.encode_with_iids(graph, root, version).map(|(document, _)| document)
    }

    /// [`encode`](Self::encode), also returning the iid given to every
    /// instance, weak-only targets included
    pub(crate) fn encode_with_iids(
        &self,
        graph: &Graph,
        root: InstanceId,
        version: impl Into<String>,
    ) -> Result<(Document, HashMap<InstanceId, Iid>), EncodeError> {
        let order = GraphWalker::new(self.catalog).reachable_instances(graph, root)?;

        let mut iids = HashMap::with_capacity(order.len());
        let mut next = Iid::ROOT;
        let mut pass = EncodePass::new(graph, &mut iids, &mut next, false);
        for &id in &order {
            pass.assign(id);
        }

        let mut map = BTreeMap::new();
        for &id in &order {
            let entry = pass.encode_instance(self.catalog, id)?;
            map.insert(entry.iid, entry);
        }

        let external = pass.external;
        let document = Document {
            version: version.into(),
            root: Iid::ROOT,
            map,
            deps: std::mem::take(&mut pass.deps).into_iter().collect(),
        };
        debug!(
            entries = document.map.len(),
            external_refs = external,
            deps = document.deps.len(),
            version = %document.version,
            "graph encoded"
        );
        Ok((document, iids))
    }
}

/// Field encoding shared by full and incremental encodes
pub(crate) struct EncodePass<'g, 'i> {
    graph: &'g Graph,
    iids: &'i mut HashMap<InstanceId, Iid>,
    next: &'i mut Iid,
    deps: BTreeSet<VersionId>,
    external: usize,
    /// Unknown targets get an iid on first sight, owned or weak
    lazy: bool,
    /// Owned targets met in lazy mode
    pub(crate) owned_targets: Vec<InstanceId>,
    /// Instances given an iid in lazy mode
    pub(crate) assigned: Vec<(InstanceId, Iid)>,
}

impl<'g, 'i> EncodePass<'g, 'i> {
    pub(crate) fn new(
        graph: &'g Graph,
        iids: &'i mut HashMap<InstanceId, Iid>,
        next: &'i mut Iid,
        lazy: bool,
    ) -> Self {
        Self {
            graph,
            iids,
            next,
            deps: BTreeSet::new(),
            external: 0,
            lazy,
            owned_targets: Vec::new(),
            assigned: Vec::new(),
        }
    }

    fn assign(&mut self, id: InstanceId) -> Iid {
        let iid = *self.next;
        self.iids.insert(id, iid);
        *self.next = iid.next();
        if self.lazy {
            self.assigned.push((id, iid));
        }
        iid
    }

    pub(crate) fn iid_of(&self, id: InstanceId) -> Option<Iid> {
        self.iids.get(&id).copied()
    }

    fn encode_instance(
        &mut self,
        catalog: &TypeCatalog,
        id: InstanceId,
    ) -> Result<EncodedInstance, EncodeError> {
        let instance = self.graph.get(id).ok_or(WalkError::MissingRoot(id))?;
        let iid = self
            .iids
            .get(&id)
            .copied()
            .ok_or(WalkError::MissingRoot(id))?;
        let mut entry = EncodedInstance::new(instance.class().clone(), iid);
        entry.uuid = instance.uuid();

        let fields = catalog
            .persisted_fields(instance.class().as_str())
            .ok_or_else(|| WalkError::UnknownClass {
                id,
                class: instance.class().clone(),
            })?;
        for field in fields {
            if let Some(value) = instance.field(&field.name) {
                let encoded = self.encode_field(id, field, value)?;
                entry.fields.insert(field.name.clone(), encoded);
            }
        }
        Ok(entry)
    }

    pub(crate) fn encode_field(
        &mut self,
        owner: InstanceId,
        field: &FieldDescriptor,
        value: &Value,
    ) -> Result<EncodedValue, EncodeError> {
        match (field.kind, value) {
            (FieldKind::Scalar, v) => encode_scalar(owner, field, v),
            (FieldKind::OwnedChild, Value::Ref(target)) => self.owned(owner, field, *target),
            (FieldKind::WeakRef, Value::Ref(target)) => self.weak(owner, field, *target),
            (FieldKind::List(mode) | FieldKind::PlainMap(mode), v) => {
                self.encode_nested(owner, field, mode, v)
            }
            (_, Value::Unresolved(addr)) => Ok(EncodedValue::Weak(addr.clone())),
            (_, v) => encode_scalar(owner, field, v),
        }
    }

    fn encode_nested(
        &mut self,
        owner: InstanceId,
        field: &FieldDescriptor,
        mode: RefMode,
        value: &Value,
    ) -> Result<EncodedValue, EncodeError> {
        match value {
            Value::List(items) => items
                .iter()
                .map(|item| self.encode_nested(owner, field, mode, item))
                .collect::<Result<_, _>>()
                .map(EncodedValue::List),
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), self.encode_nested(owner, field, mode, v)?)))
                .collect::<Result<_, EncodeError>>()
                .map(EncodedValue::Map),
            Value::Ref(target) => match mode {
                RefMode::Owned => self.owned(owner, field, *target),
                RefMode::Weak => self.weak(owner, field, *target),
            },
            Value::Unresolved(addr) => Ok(EncodedValue::Weak(addr.clone())),
            v => encode_scalar(owner, field, v),
        }
    }

    fn owned(
        &mut self,
        owner: InstanceId,
        field: &FieldDescriptor,
        target: InstanceId,
    ) -> Result<EncodedValue, EncodeError> {
        let dangling = || {
            EncodeError::Schema(WalkError::DanglingRef {
                owner,
                field: field.name.clone(),
                target,
            })
        };
        if self.lazy {
            if !self.graph.contains(target) {
                return Err(dangling());
            }
            self.owned_targets.push(target);
            let iid = match self.iids.get(&target) {
                Some(&iid) => iid,
                None => self.assign(target),
            };
            return Ok(EncodedValue::owned(iid));
        }
        // Walk order already assigned every owned target
        self.iids
            .get(&target)
            .map(|&iid| EncodedValue::owned(iid))
            .ok_or_else(dangling)
    }

    fn weak(
        &mut self,
        owner: InstanceId,
        field: &FieldDescriptor,
        target: InstanceId,
    ) -> Result<EncodedValue, EncodeError> {
        let instance = self.graph.get(target).ok_or_else(|| WalkError::DanglingRef {
            owner,
            field: field.name.clone(),
            target,
        })?;
        let uuid = instance.uuid();

        if let Some(&iid) = self.iids.get(&target) {
            return Ok(EncodedValue::weak(iid, uuid));
        }
        if self.lazy {
            // Addressability is settled once the whole update is known
            let iid = self.assign(target);
            return Ok(EncodedValue::weak(iid, uuid));
        }

        if uuid.is_none() {
            return Err(EncodeError::UnaddressableWeakTarget {
                owner,
                field: field.name.clone(),
                target,
            });
        }
        if let Some(origin) = instance.origin() {
            self.deps.insert(origin.clone());
        }
        self.external += 1;
        let iid = self.assign(target);
        Ok(EncodedValue::weak(iid, uuid))
    }
}

fn encode_scalar(
    owner: InstanceId,
    field: &FieldDescriptor,
    value: &Value,
) -> Result<EncodedValue, EncodeError> {
    Ok(match value {
        Value::Null => EncodedValue::Null,
        Value::Bool(b) => EncodedValue::Bool(*b),
        Value::Int(i) => EncodedValue::Int(*i),
        Value::Float(f) if f.is_finite() => EncodedValue::Float(*f),
        Value::Float(_) => {
            return Err(EncodeError::NonFiniteFloat {
                owner,
                field: field.name.clone(),
            })
        }
        Value::String(s) => EncodedValue::String(s.clone()),
        other => {
            return Err(EncodeError::Schema(WalkError::ShapeMismatch {
                owner,
                field: field.name.clone(),
                expected: field.kind.name(),
                found: other.kind_name(),
            }))
        }
    })
}
