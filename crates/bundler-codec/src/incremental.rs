//! Incremental re-encoding
//!
//! [`IncrementalEncoder`] keeps a document alongside the live graph it was
//! encoded from. After an edit, only the instances named in the change set
//! (and instances they newly own) are re-encoded. Two reverse indexes make
//! that possible without rescanning the document:
//! - owners: every slot holding an owned reference to an entry, used to
//!   find entries that lost their last owner
//! - weak referrers: every slot holding a weak reference, used to find
//!   references that left the document
//!
//! Iids of existing entries never change. New instances get fresh iids
//! past the highest one in use, so the output is not byte-identical to a
//! full [`Encoder::encode`] of the same graph, but it decodes to an
//! isomorphic graph.

use crate::decoder::Decoded;
use crate::encoder::{EncodePass, Encoder};
use crate::error::{CorruptionError, EncodeError, OwnershipViolation, WalkError};
use crate::refs::{self, RefTarget};
use crate::walker::GraphWalker;
use bundler_catalog::{FieldDescriptor, TypeCatalog};
use bundler_model::{Document, EncodedInstance, EncodedValue, Graph, Iid, InstanceId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use tracing::{debug, trace};

/// An edited instance, optionally narrowed to one field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Change {
    /// Edited instance
    pub instance: InstanceId,
    /// Edited field, `None` when any field may have changed
    pub field: Option<String>,
}

impl Change {
    /// One field of `instance` changed
    #[inline]
    #[must_use]
    pub fn field(instance: InstanceId, field: impl Into<String>) -> Self {
        Self {
            instance,
            field: Some(field.into()),
        }
    }

    /// Anything on `instance` may have changed
    #[inline]
    #[must_use]
    pub fn instance(instance: InstanceId) -> Self {
        Self {
            instance,
            field: None,
        }
    }
}

/// Field of an entry that holds a reference
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefSlot {
    /// Entry holding the reference
    pub owner: Iid,
    /// Top-level field name
    pub field: String,
}

/// Referencing slots per target iid, counted
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct RefIndex(BTreeMap<Iid, BTreeMap<RefSlot, usize>>);

impl RefIndex {
    fn add(&mut self, target: Iid, slot: RefSlot) {
        *self.0.entry(target).or_default().entry(slot).or_insert(0) += 1;
    }

    /// Returns true when `target` lost its last referrer
    fn remove(&mut self, target: Iid, slot: &RefSlot) -> bool {
        let Some(slots) = self.0.get_mut(&target) else {
            return false;
        };
        if let Some(count) = slots.get_mut(slot) {
            *count -= 1;
            if *count == 0 {
                slots.remove(slot);
            }
        }
        if slots.is_empty() {
            self.0.remove(&target);
            true
        } else {
            false
        }
    }

    fn contains(&self, target: Iid) -> bool {
        self.0.contains_key(&target)
    }

    fn slots(&self, target: Iid) -> impl Iterator<Item = (&RefSlot, usize)> {
        self.0
            .get(&target)
            .into_iter()
            .flat_map(|slots| slots.iter().map(|(slot, count)| (slot, *count)))
    }

    fn targets(&self) -> impl Iterator<Item = Iid> + '_ {
        self.0.keys().copied()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Indexes {
    owners: RefIndex,
    weak: RefIndex,
}

impl Indexes {
    fn build(document: &Document) -> Self {
        let mut indexes = Self::default();
        for (iid, entry) in &document.map {
            for (field, value) in &entry.fields {
                indexes.add(*iid, field, value);
            }
        }
        indexes
    }

    fn add(&mut self, owner: Iid, field: &str, value: &EncodedValue) {
        refs::visit_value(owner, field, value, &mut |site| {
            let slot = RefSlot {
                owner,
                field: site.field.to_string(),
            };
            match site.target {
                RefTarget::Owned(target) => self.owners.add(target, slot),
                RefTarget::Weak(addr) => self.weak.add(addr.iid_ref, slot),
            }
        });
    }

    /// Drop the references in `value`; owned targets left without any
    /// owner are pushed onto `orphaned`
    fn retract(&mut self, owner: Iid, field: &str, value: &EncodedValue, orphaned: &mut Vec<Iid>) {
        refs::visit_value(owner, field, value, &mut |site| {
            let slot = RefSlot {
                owner,
                field: site.field.to_string(),
            };
            match site.target {
                RefTarget::Owned(target) => {
                    if self.owners.remove(target, &slot) {
                        orphaned.push(target);
                    }
                }
                RefTarget::Weak(addr) => {
                    self.weak.remove(addr.iid_ref, &slot);
                }
            }
        });
    }
}

/// Keeps a document in step with a live graph, re-encoding only what changed
#[derive(Debug, Clone)]
pub struct IncrementalEncoder<'c> {
    catalog: &'c TypeCatalog,
    root: InstanceId,
    document: Document,
    iids: HashMap<InstanceId, Iid>,
    instances: HashMap<Iid, InstanceId>,
    next: Iid,
    indexes: Indexes,
}

impl<'c> IncrementalEncoder<'c> {
    /// Start from a full encode of everything owned by `root`
    ///
    /// # Errors
    /// Same as [`Encoder::encode`]
    pub fn new(
        catalog: &'c TypeCatalog,
        graph: &Graph,
        root: InstanceId,
        version: impl Into<String>,
    ) -> Result<Self, EncodeError> {
        let (document, iids) = Encoder::new(catalog).encode_with_iids(graph, root, version)?;
        Ok(Self::assemble(catalog, root, document, iids))
    }

    /// Resume from `document` and the result of decoding it
    ///
    /// Later updates must be made against `decoded.graph`. Unreachable
    /// entries are dropped first. External weak references keep their
    /// recorded iids.
    #[must_use]
    pub fn from_decoded(catalog: &'c TypeCatalog, mut document: Document, decoded: &Decoded) -> Self {
        let pruned = refs::prune_unreachable(&mut document);
        if !pruned.is_empty() {
            debug!(pruned = pruned.len(), "dropped unreachable entries before resuming");
        }

        let mut iids: HashMap<InstanceId, Iid> = decoded
            .iids
            .iter()
            .filter(|(iid, _)| document.map.contains_key(iid))
            .map(|(iid, id)| (*id, *iid))
            .collect();
        for external in refs::external_refs(&document) {
            let target = external
                .address
                .uuid
                .and_then(|uuid| decoded.graph.find_by_uuid(uuid));
            if let Some(id) = target {
                iids.entry(id).or_insert(external.address.iid_ref);
            }
        }
        Self::assemble(catalog, decoded.root, document, iids)
    }

    fn assemble(
        catalog: &'c TypeCatalog,
        root: InstanceId,
        document: Document,
        iids: HashMap<InstanceId, Iid>,
    ) -> Self {
        let indexes = Indexes::build(&document);
        let instances = iids.iter().map(|(id, iid)| (*iid, *id)).collect();
        let next = iids
            .values()
            .copied()
            .chain(document.map.keys().copied())
            .chain(indexes.weak.targets())
            .max()
            .map_or(Iid::ROOT, Iid::next);
        Self {
            catalog,
            root,
            document,
            iids,
            instances,
            next,
            indexes,
        }
    }

    /// Current document
    #[inline]
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Take the document, dropping the indexes
    #[inline]
    #[must_use]
    pub fn into_document(self) -> Document {
        self.document
    }

    /// Root instance
    #[inline]
    #[must_use]
    pub fn root(&self) -> InstanceId {
        self.root
    }

    /// Iid given to `id`, weak-only targets included
    #[inline]
    #[must_use]
    pub fn iid_of(&self, id: InstanceId) -> Option<Iid> {
        self.iids.get(&id).copied()
    }

    /// Slots holding an owned reference to `iid`
    pub fn owners(&self, iid: Iid) -> impl Iterator<Item = &RefSlot> {
        self.indexes.owners.slots(iid).map(|(slot, _)| slot)
    }

    /// Slots holding a weak reference to `iid`
    pub fn weak_referrers(&self, iid: Iid) -> impl Iterator<Item = &RefSlot> {
        self.indexes.weak.slots(iid).map(|(slot, _)| slot)
    }

    /// Bring the document in line with `graph` after `changes`
    ///
    /// Changes to instances without an entry are ignored; they enter the
    /// document once an encoded owner references them. Entries that lose
    /// their last owner are removed together with everything only they
    /// owned.
    ///
    /// # Errors
    /// Returns error if a re-encoded instance does not match the catalog,
    /// or a weak reference leaves the document towards an instance with no
    /// uuid. The document is then partially updated and the encoder should
    /// be rebuilt with [`new`](Self::new).
    pub fn update(&mut self, graph: &Graph, changes: &[Change]) -> Result<&Document, EncodeError> {
        let walker = GraphWalker::new(self.catalog);
        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();
        for change in changes {
            let tracked = self
                .iids
                .get(&change.instance)
                .is_some_and(|iid| self.document.map.contains_key(iid));
            if tracked && seen.insert((change.instance, change.field.clone())) {
                queue.push_back((change.instance, change.field.clone()));
            }
        }

        let mut orphaned = Vec::new();
        let mut processed = 0usize;
        while let Some((id, field)) = queue.pop_front() {
            walker.check(graph, id)?;
            self.reencode(graph, id, field.as_deref(), &mut orphaned, |target| {
                if seen.insert((target, None)) {
                    queue.push_back((target, None));
                }
            })?;
            processed += 1;
        }

        let removed = self.prune(orphaned);
        self.settle_external(graph)?;

        debug!(
            changes = changes.len(),
            processed,
            removed,
            entries = self.document.map.len(),
            deps = self.document.deps.len(),
            "document updated"
        );
        Ok(&self.document)
    }

    /// Re-encode `field` of `id`, or the whole entry; owned targets with no
    /// entry yet are handed to `discover`
    fn reencode(
        &mut self,
        graph: &Graph,
        id: InstanceId,
        field: Option<&str>,
        orphaned: &mut Vec<Iid>,
        mut discover: impl FnMut(InstanceId),
    ) -> Result<(), EncodeError> {
        let catalog = self.catalog;
        let instance = graph.get(id).ok_or(WalkError::MissingRoot(id))?;
        let class = instance.class();
        let iid = self.iids.get(&id).copied().ok_or(WalkError::MissingRoot(id))?;
        let exists = self.document.map.contains_key(&iid);
        let whole = field.is_none() || !exists;

        let fields: Vec<&FieldDescriptor> = match field {
            Some(name) if exists => match catalog.field(class.as_str(), name) {
                Some(descriptor) if descriptor.is_persisted() => vec![descriptor],
                Some(_) => Vec::new(),
                None => {
                    return Err(WalkError::UnknownField {
                        id,
                        class: class.clone(),
                        field: name.to_string(),
                    }
                    .into())
                }
            },
            _ => catalog
                .persisted_fields(class.as_str())
                .ok_or_else(|| WalkError::UnknownClass {
                    id,
                    class: class.clone(),
                })?
                .collect(),
        };

        if let Some(entry) = self.document.map.get(&iid) {
            for (name, value) in &entry.fields {
                if whole || fields.iter().any(|f| &f.name == name) {
                    self.indexes.retract(iid, name, value, orphaned);
                }
            }
        }

        let mut pass = EncodePass::new(graph, &mut self.iids, &mut self.next, true);
        let mut encoded = Vec::with_capacity(fields.len());
        for descriptor in &fields {
            let value = match instance.field(&descriptor.name) {
                Some(value) => Some(pass.encode_field(id, descriptor, value)?),
                None => None,
            };
            encoded.push((descriptor.name.clone(), value));
        }
        let owned_targets = std::mem::take(&mut pass.owned_targets);
        let assigned = std::mem::take(&mut pass.assigned);

        for (target, target_iid) in assigned {
            self.instances.insert(target_iid, target);
        }
        for (name, value) in &encoded {
            if let Some(value) = value {
                self.indexes.add(iid, name, value);
            }
        }
        for target in owned_targets {
            let known = self
                .iids
                .get(&target)
                .is_some_and(|t| self.document.map.contains_key(t));
            if !known {
                discover(target);
            }
        }

        match self.document.map.get_mut(&iid) {
            Some(entry) if !whole => {
                for (name, value) in encoded {
                    if let Some(value) = value {
                        entry.fields.insert(name, value);
                    } else {
                        entry.fields.remove(&name);
                    }
                }
            }
            _ => {
                let mut entry = EncodedInstance::new(class.clone(), iid);
                entry.uuid = instance.uuid();
                entry.fields = encoded
                    .into_iter()
                    .filter_map(|(name, value)| value.map(|v| (name, v)))
                    .collect();
                self.document.map.insert(iid, entry);
            }
        }
        trace!(%iid, field, "entry re-encoded");
        Ok(())
    }

    /// Remove orphaned entries, cascading through what they owned
    fn prune(&mut self, mut orphaned: Vec<Iid>) -> usize {
        let mut removed = 0;
        while let Some(iid) = orphaned.pop() {
            if iid == self.document.root || self.indexes.owners.contains(iid) {
                continue;
            }
            let Some(entry) = self.document.map.remove(&iid) else {
                continue;
            };
            for (name, value) in &entry.fields {
                self.indexes.retract(iid, name, value, &mut orphaned);
            }
            removed += 1;
        }
        removed
    }

    /// Check every weak reference leaving the document and recompute deps
    fn settle_external(&mut self, graph: &Graph) -> Result<(), EncodeError> {
        let mut deps = BTreeSet::new();
        for target in self.indexes.weak.targets() {
            if self.document.map.contains_key(&target) {
                continue;
            }
            // Loose references copied through from an earlier decode
            let Some(&id) = self.instances.get(&target) else {
                continue;
            };
            let instance = graph.get(id).ok_or(WalkError::MissingRoot(id))?;
            if instance.uuid().is_none() {
                let slot = self.indexes.weak.slots(target).next().map(|(slot, _)| slot);
                return Err(EncodeError::UnaddressableWeakTarget {
                    owner: slot
                        .and_then(|s| self.instances.get(&s.owner))
                        .copied()
                        .unwrap_or(self.root),
                    field: slot.map(|s| s.field.clone()).unwrap_or_default(),
                    target: id,
                });
            }
            if let Some(origin) = instance.origin() {
                deps.insert(origin.clone());
            }
        }
        self.document.deps = deps.into_iter().collect();
        Ok(())
    }

    /// Verify the ownership tree through the indexes, then the references
    ///
    /// # Errors
    /// Returns the violations found; a healthy encoder never fails this
    pub fn check_invariants(&self) -> Result<(), CorruptionError> {
        let doc = &self.document;
        let mut violations = Vec::new();
        if !doc.map.contains_key(&doc.root) {
            violations.push(OwnershipViolation::MissingRoot { root: doc.root });
        }
        for &iid in doc.map.keys() {
            let owners: Vec<Iid> = self
                .indexes
                .owners
                .slots(iid)
                .flat_map(|(slot, count)| std::iter::repeat(slot.owner).take(count))
                .collect();
            if iid == doc.root {
                if let Some(&owner) = owners.first() {
                    violations.push(OwnershipViolation::RootOwned { owner });
                }
                continue;
            }
            match owners.as_slice() {
                [] => violations.push(OwnershipViolation::Orphan { iid }),
                [owner] if !doc.map.contains_key(owner) => {
                    violations.push(OwnershipViolation::Unreachable { iid });
                }
                [_] => {}
                _ => violations.push(OwnershipViolation::MultipleOwners { iid, owners }),
            }
        }
        if violations.is_empty() {
            violations = refs::check_ownership(doc);
        }
        if !violations.is_empty() {
            return Err(CorruptionError::Structure(violations));
        }
        refs::check_references(doc)
    }
}
