//! Catalog-driven graph traversal
//!
//! [`GraphWalker`] visits every instance reachable from a root through
//! owning edges, exactly once, root first, depth-first, in field
//! declaration order. Weak references are opaque to the walker: they are
//! checked for existence but never followed.
//!
//! Every persisted field is validated against its [`FieldKind`] on the way,
//! so anything downstream of a successful walk can rely on value shapes.

use crate::error::WalkError;
use bundler_catalog::{FieldDescriptor, FieldKind, RefMode, TypeCatalog};
use bundler_model::{ClassName, Graph, InstanceId, Value};
use std::collections::{HashMap, HashSet};

/// Keys that mark reference shapes on the wire
const RESERVED_MAP_KEYS: [&str; 2] = ["__ref", "iidRef"];

/// One persisted field of a visited instance
#[derive(Debug, Clone, Copy)]
pub struct FieldVisit<'a> {
    /// Instance holding the field
    pub owner: InstanceId,
    /// Its class
    pub class: &'a ClassName,
    /// Field metadata
    pub field: &'a FieldDescriptor,
    /// Current value
    pub value: &'a Value,
}

impl FieldVisit<'_> {
    /// Field kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.field.kind
    }
}

/// Walks live graphs using a [`TypeCatalog`]
#[derive(Debug, Clone, Copy)]
pub struct GraphWalker<'c> {
    catalog: &'c TypeCatalog,
}

impl<'c> GraphWalker<'c> {
    /// Walker over `catalog`
    #[inline]
    #[must_use]
    pub fn new(catalog: &'c TypeCatalog) -> Self {
        Self { catalog }
    }

    /// Visit every instance owned (transitively) by `root`
    ///
    /// `visit` is called once per persisted, set field. Returns the visited
    /// instances in visit order.
    ///
    /// # Errors
    /// Returns error on any mismatch between the graph and the catalog
    pub fn walk<F>(
        &self,
        graph: &Graph,
        root: InstanceId,
        mut visit: F,
    ) -> Result<Vec<InstanceId>, WalkError>
    where
        F: FnMut(FieldVisit<'_>),
    {
        if !graph.contains(root) {
            return Err(WalkError::MissingRoot(root));
        }

        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![root];
        let mut children = Vec::new();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            order.push(id);

            self.check_instance(graph, id, &mut children, &mut visit)?;
            stack.extend(children.drain(..).rev());
        }

        Ok(order)
    }

    /// Validate a single instance against its class without walking on
    ///
    /// # Errors
    /// Returns error on any mismatch between the instance and the catalog
    pub fn check(&self, graph: &Graph, id: InstanceId) -> Result<(), WalkError> {
        self.check_instance(graph, id, &mut Vec::new(), &mut |_: FieldVisit<'_>| {})
    }

    /// Class checks for one instance; owned children are appended to
    /// `children` in field order
    fn check_instance<F>(
        &self,
        graph: &Graph,
        id: InstanceId,
        children: &mut Vec<InstanceId>,
        visit: &mut F,
    ) -> Result<(), WalkError>
    where
        F: FnMut(FieldVisit<'_>),
    {
        let instance = graph.get(id).ok_or(WalkError::MissingRoot(id))?;
        let class = instance.class();
        let fields = self
            .catalog
            .all_fields(class.as_str())
            .ok_or_else(|| WalkError::UnknownClass {
                id,
                class: class.clone(),
            })?;

        if let Some(name) = instance
            .fields()
            .keys()
            .find(|name| !fields.iter().any(|f| &f.name == *name))
        {
            return Err(WalkError::UnknownField {
                id,
                class: class.clone(),
                field: name.clone(),
            });
        }

        for field in fields.iter().filter(|f| f.is_persisted()) {
            let Some(value) = instance.field(&field.name) else {
                if field.optional {
                    continue;
                }
                return Err(WalkError::MissingField {
                    id,
                    class: class.clone(),
                    field: field.name.clone(),
                });
            };
            check_field(graph, id, field, value, children)?;
            visit(FieldVisit {
                owner: id,
                class,
                field,
                value,
            });
        }
        Ok(())
    }

    /// Instances owned (transitively) by `root`, in walk order
    ///
    /// # Errors
    /// Returns error on any mismatch between the graph and the catalog
    pub fn reachable_instances(
        &self,
        graph: &Graph,
        root: InstanceId,
    ) -> Result<Vec<InstanceId>, WalkError> {
        self.walk(graph, root, |_| {})
    }

    /// Owning instances of every owned instance under `root`
    ///
    /// Under a well-formed graph each list has exactly one element.
    ///
    /// # Errors
    /// Returns error on any mismatch between the graph and the catalog
    pub fn owned_parents(
        &self,
        graph: &Graph,
        root: InstanceId,
    ) -> Result<HashMap<InstanceId, Vec<InstanceId>>, WalkError> {
        let mut parents: HashMap<InstanceId, Vec<InstanceId>> = HashMap::new();
        self.walk(graph, root, |visit| {
            if visit.kind().owns() {
                for child in visit.value.refs() {
                    parents.entry(child).or_default().push(visit.owner);
                }
            }
        })?;
        Ok(parents)
    }
}

fn shape_mismatch(owner: InstanceId, field: &FieldDescriptor, found: &Value) -> WalkError {
    WalkError::ShapeMismatch {
        owner,
        field: field.name.clone(),
        expected: field.kind.name(),
        found: found.kind_name(),
    }
}

fn ensure_exists(
    graph: &Graph,
    owner: InstanceId,
    field: &FieldDescriptor,
    target: InstanceId,
) -> Result<(), WalkError> {
    if graph.contains(target) {
        Ok(())
    } else {
        Err(WalkError::DanglingRef {
            owner,
            field: field.name.clone(),
            target,
        })
    }
}

/// Validate a top-level field value, collecting owned children in order
fn check_field(
    graph: &Graph,
    owner: InstanceId,
    field: &FieldDescriptor,
    value: &Value,
    children: &mut Vec<InstanceId>,
) -> Result<(), WalkError> {
    match (field.kind, value) {
        (FieldKind::Scalar, v) if v.is_scalar() => Ok(()),
        (_, Value::Null) if field.optional => Ok(()),
        (FieldKind::OwnedChild, Value::Ref(target)) => {
            ensure_exists(graph, owner, field, *target)?;
            children.push(*target);
            Ok(())
        }
        (FieldKind::WeakRef, Value::Ref(target)) => ensure_exists(graph, owner, field, *target),
        (FieldKind::WeakRef, Value::Unresolved(_)) => Ok(()),
        (FieldKind::List(mode), Value::List(items)) => items
            .iter()
            .try_for_each(|item| check_nested(graph, owner, field, mode, item, children)),
        (FieldKind::PlainMap(mode), Value::Map(_)) => {
            check_nested(graph, owner, field, mode, value, children)
        }
        (_, v) => Err(shape_mismatch(owner, field, v)),
    }
}

/// Validate a value nested inside a list or plain map
fn check_nested(
    graph: &Graph,
    owner: InstanceId,
    field: &FieldDescriptor,
    mode: RefMode,
    value: &Value,
    children: &mut Vec<InstanceId>,
) -> Result<(), WalkError> {
    match value {
        v if v.is_scalar() => Ok(()),
        Value::List(items) => items
            .iter()
            .try_for_each(|item| check_nested(graph, owner, field, mode, item, children)),
        Value::Map(entries) => {
            if let Some(key) = RESERVED_MAP_KEYS.iter().find(|k| entries.contains_key(**k)) {
                return Err(WalkError::ReservedKey {
                    owner,
                    field: field.name.clone(),
                    key: *key,
                });
            }
            entries
                .values()
                .try_for_each(|item| check_nested(graph, owner, field, mode, item, children))
        }
        Value::Ref(target) => {
            ensure_exists(graph, owner, field, *target)?;
            if mode == RefMode::Owned {
                children.push(*target);
            }
            Ok(())
        }
        Value::Unresolved(_) if mode == RefMode::Weak => Ok(()),
        v => Err(shape_mismatch(owner, field, v)),
    }
}
