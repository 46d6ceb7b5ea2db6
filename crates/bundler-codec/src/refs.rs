//! Reference analysis over documents
//!
//! Works on the encoded form alone, without a type catalog: owned
//! references are `{"__ref": n}` and weak references are addresses,
//! wherever they are nested. Used to vet documents before decoding and by
//! migrations that restructure the ownership tree.

use crate::error::{CorruptionError, OwnershipViolation};
use bundler_model::{Address, Document, EncodedValue, Iid};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Reference found in a document entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefTarget<'a> {
    /// `{"__ref": iid}`
    Owned(Iid),
    /// `{"iidRef": iid, "uuid": …}`
    Weak(&'a Address),
}

/// A reference and where it sits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefSite<'a> {
    /// Entry holding the reference
    pub owner: Iid,
    /// Top-level field name
    pub field: &'a str,
    /// The reference
    pub target: RefTarget<'a>,
}

/// Weak reference whose target is not in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRef {
    /// Entry holding the reference
    pub owner: Iid,
    /// Top-level field name
    pub field: String,
    /// The address
    pub address: Address,
}

/// Call `f` for every reference in every entry, in map and field order
pub fn visit_refs<'a, F>(doc: &'a Document, mut f: F)
where
    F: FnMut(RefSite<'a>),
{
    for (iid, entry) in &doc.map {
        for (field, value) in &entry.fields {
            visit_value(*iid, field, value, &mut f);
        }
    }
}

pub(crate) fn visit_value<'a, F>(owner: Iid, field: &'a str, value: &'a EncodedValue, f: &mut F)
where
    F: FnMut(RefSite<'a>),
{
    match value {
        EncodedValue::Ref(r) => f(RefSite {
            owner,
            field,
            target: RefTarget::Owned(r.iid),
        }),
        EncodedValue::Weak(addr) => f(RefSite {
            owner,
            field,
            target: RefTarget::Weak(addr),
        }),
        EncodedValue::List(items) => {
            for item in items {
                visit_value(owner, field, item, f);
            }
        }
        EncodedValue::Map(entries) => {
            for item in entries.values() {
                visit_value(owner, field, item, f);
            }
        }
        _ => {}
    }
}

/// Weak references that leave the document
///
/// A weak reference is external exactly when its `iidRef` is absent from
/// the document's own map; such references are resolved through
/// dependency documents.
#[must_use]
pub fn external_refs(doc: &Document) -> Vec<ExternalRef> {
    let mut out = Vec::new();
    visit_refs(doc, |site| {
        if let RefTarget::Weak(addr) = site.target {
            if !doc.map.contains_key(&addr.iid_ref) {
                out.push(ExternalRef {
                    owner: site.owner,
                    field: site.field.to_string(),
                    address: addr.clone(),
                });
            }
        }
    });
    out
}

/// Check that every reference can be followed
///
/// Every entry sits under its own iid, every owned reference points into
/// the map, and every external weak reference carries a uuid.
///
/// # Errors
/// Returns the first problem found
pub fn check_references(doc: &Document) -> Result<(), CorruptionError> {
    if !doc.map.contains_key(&doc.root) {
        return Err(CorruptionError::MissingRoot(doc.root));
    }
    if let Some((key, entry)) = doc.map.iter().find(|(key, entry)| **key != entry.iid) {
        return Err(CorruptionError::IidMismatch {
            key: *key,
            iid: entry.iid,
        });
    }

    let mut problem = None;
    visit_refs(doc, |site| {
        if problem.is_some() {
            return;
        }
        match site.target {
            RefTarget::Owned(target) if !doc.map.contains_key(&target) => {
                problem = Some(CorruptionError::DanglingRef {
                    owner: site.owner,
                    field: site.field.to_string(),
                    target,
                });
            }
            RefTarget::Weak(addr) if addr.uuid.is_none() && !doc.map.contains_key(&addr.iid_ref) => {
                problem = Some(CorruptionError::UnaddressableRef {
                    owner: site.owner,
                    field: site.field.to_string(),
                    target: addr.iid_ref,
                });
            }
            _ => {}
        }
    });
    problem.map_or(Ok(()), Err)
}

/// Owners of every entry, via owned references
fn owners_of(doc: &Document) -> BTreeMap<Iid, Vec<Iid>> {
    let mut owners: BTreeMap<Iid, Vec<Iid>> = BTreeMap::new();
    visit_refs(doc, |site| {
        if let RefTarget::Owned(target) = site.target {
            owners.entry(target).or_default().push(site.owner);
        }
    });
    owners
}

/// Entries reachable from the root through owned references
#[must_use]
pub fn reachable_entries(doc: &Document) -> BTreeSet<Iid> {
    let mut children: BTreeMap<Iid, Vec<Iid>> = BTreeMap::new();
    visit_refs(doc, |site| {
        if let RefTarget::Owned(target) = site.target {
            children.entry(site.owner).or_default().push(target);
        }
    });

    let mut reached = BTreeSet::new();
    if !doc.map.contains_key(&doc.root) {
        return reached;
    }
    let mut queue = VecDeque::from([doc.root]);
    while let Some(iid) = queue.pop_front() {
        if !reached.insert(iid) {
            continue;
        }
        if let Some(next) = children.get(&iid) {
            queue.extend(next.iter().filter(|c| doc.map.contains_key(*c)));
        }
    }
    reached
}

/// Check that owned references form a tree rooted at `root`
///
/// Returns every violation found; an empty list means the document's map
/// is exactly the ownership tree.
#[must_use]
pub fn check_ownership(doc: &Document) -> Vec<OwnershipViolation> {
    let mut violations = Vec::new();
    if !doc.map.contains_key(&doc.root) {
        violations.push(OwnershipViolation::MissingRoot { root: doc.root });
        return violations;
    }

    let owners = owners_of(doc);
    for (target, by) in &owners {
        if !doc.map.contains_key(target) {
            for owner in by {
                violations.push(OwnershipViolation::MissingTarget {
                    owner: *owner,
                    target: *target,
                });
            }
        }
    }

    let reached = reachable_entries(doc);
    for iid in doc.map.keys() {
        let by = owners.get(iid).map_or(&[][..], Vec::as_slice);
        if *iid == doc.root {
            if let Some(owner) = by.first() {
                violations.push(OwnershipViolation::RootOwned { owner: *owner });
            }
            continue;
        }
        match by.len() {
            0 => violations.push(OwnershipViolation::Orphan { iid: *iid }),
            1 => {}
            _ => violations.push(OwnershipViolation::MultipleOwners {
                iid: *iid,
                owners: by.to_vec(),
            }),
        }
        if !by.is_empty() && !reached.contains(iid) {
            violations.push(OwnershipViolation::Unreachable { iid: *iid });
        }
    }
    violations
}

/// Drop entries not reachable from the root through owned references
///
/// Returns the removed iids in ascending order. Weak references to removed
/// entries are left as they are and become external.
pub fn prune_unreachable(doc: &mut Document) -> Vec<Iid> {
    let reached = reachable_entries(doc);
    let removed: Vec<Iid> = doc
        .map
        .keys()
        .filter(|iid| !reached.contains(*iid))
        .copied()
        .collect();
    for iid in &removed {
        doc.map.remove(iid);
    }
    removed
}
