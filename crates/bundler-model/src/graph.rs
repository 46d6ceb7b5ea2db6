//! Arena-backed instance graph
//!
//! All live instances sit in one [`Graph`] and refer to each other by
//! [`InstanceId`]. Cycles and shared references are plain index values,
//! so ownership never has to follow the shape of the model.

use crate::ids::{ClassName, InstanceId, VersionId};
use crate::value::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A typed node of the design model
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    class: ClassName,
    uuid: Option<Uuid>,
    origin: Option<VersionId>,
    fields: BTreeMap<String, Value>,
}

impl Instance {
    /// Empty instance of `class` with no global identity
    #[must_use]
    pub fn new(class: impl Into<ClassName>) -> Self {
        Self {
            class: class.into(),
            uuid: None,
            origin: None,
            fields: BTreeMap::new(),
        }
    }

    /// Set the global identity
    #[inline]
    #[must_use]
    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    /// Assign a fresh random global identity
    #[inline]
    #[must_use]
    pub fn with_new_uuid(self) -> Self {
        self.with_uuid(Uuid::new_v4())
    }

    /// Record the dependency document this instance was loaded from
    #[inline]
    #[must_use]
    pub fn with_origin(mut self, origin: VersionId) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Set a field (builder style)
    #[inline]
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Class tag
    #[inline]
    #[must_use]
    pub fn class(&self) -> &ClassName {
        &self.class
    }

    /// Global identity, if any
    #[inline]
    #[must_use]
    pub fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    /// Dependency document this instance came from (`None` for local)
    #[inline]
    #[must_use]
    pub fn origin(&self) -> Option<&VersionId> {
        self.origin.as_ref()
    }

    /// Field value, if set
    #[inline]
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// All set fields, by name
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Set a field, returning the previous value
    #[inline]
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    /// Remove a field
    #[inline]
    pub fn remove_field(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }
}

/// Arena of instances
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    instances: Vec<Instance>,
}

impl Graph {
    /// Empty graph
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty graph with room for `capacity` instances
    #[inline]
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            instances: Vec::with_capacity(capacity),
        }
    }

    /// Add an instance, returning its id
    pub fn insert(&mut self, instance: Instance) -> InstanceId {
        let id = InstanceId::from_index(self.instances.len());
        self.instances.push(instance);
        id
    }

    /// Instance by id
    #[inline]
    #[must_use]
    pub fn get(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(id.index())
    }

    /// Mutable instance by id
    #[inline]
    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        self.instances.get_mut(id.index())
    }

    /// Whether `id` belongs to this arena
    #[inline]
    #[must_use]
    pub fn contains(&self, id: InstanceId) -> bool {
        id.index() < self.instances.len()
    }

    /// Field of an instance
    #[inline]
    #[must_use]
    pub fn field(&self, id: InstanceId, name: &str) -> Option<&Value> {
        self.get(id).and_then(|inst| inst.field(name))
    }

    /// Set a field on an instance
    ///
    /// Returns `false` if `id` is not in this graph.
    pub fn set_field(&mut self, id: InstanceId, name: impl Into<String>, value: impl Into<Value>) -> bool {
        match self.get_mut(id) {
            Some(inst) => {
                inst.set_field(name, value);
                true
            }
            None => false,
        }
    }

    /// Append to a list field, creating it if unset
    ///
    /// Returns `false` if `id` is missing or the field holds a non-list.
    pub fn push_to_list(&mut self, id: InstanceId, name: &str, value: impl Into<Value>) -> bool {
        let Some(inst) = self.get_mut(id) else {
            return false;
        };
        match inst.fields.entry(name.to_string()).or_insert_with(|| Value::List(Vec::new())) {
            Value::List(items) => {
                items.push(value.into());
                true
            }
            _ => false,
        }
    }

    /// Follow a `Ref` field
    #[must_use]
    pub fn follow(&self, id: InstanceId, name: &str) -> Option<InstanceId> {
        self.field(id, name).and_then(Value::as_ref_id)
    }

    /// Instance carrying `uuid`, if any
    #[must_use]
    pub fn find_by_uuid(&self, uuid: Uuid) -> Option<InstanceId> {
        self.instances
            .iter()
            .position(|inst| inst.uuid == Some(uuid))
            .map(InstanceId::from_index)
    }

    /// Number of instances
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// True if the arena is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Iterate instances with their ids
    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &Instance)> {
        self.instances
            .iter()
            .enumerate()
            .map(|(i, inst)| (InstanceId::from_index(i), inst))
    }
}
