//! The [`TypeCatalog`] registry and its builder
//!
//! Classes register once at start-up through a [`CatalogBuilder`]; the
//! built catalog is immutable, resolves inheritance up front, and is shared
//! read-only (usually behind an `Arc`) by every encoder and decoder.

use crate::class::{ClassDescriptor, ModelClass};
use crate::error::CatalogError;
use crate::field::FieldDescriptor;
use bundler_model::ClassName;
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::debug;

/// Keys every document entry already uses
const RESERVED_FIELDS: [&str; 3] = ["__type", "__iid", "__uuid"];

#[derive(Debug, Clone)]
struct ClassEntry {
    descriptor: ClassDescriptor,
    /// Inherited fields first, then own fields
    all_fields: Vec<FieldDescriptor>,
    /// Nearest first
    ancestors: Vec<ClassName>,
}

/// Immutable registry of model classes
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    classes: IndexMap<ClassName, ClassEntry>,
}

impl TypeCatalog {
    /// Start building a catalog
    #[inline]
    #[must_use]
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    /// Descriptor of `class`
    #[inline]
    #[must_use]
    pub fn class(&self, class: &str) -> Option<&ClassDescriptor> {
        self.classes.get(class).map(|e| &e.descriptor)
    }

    /// Shared class tag for `class`
    #[inline]
    #[must_use]
    pub fn class_name(&self, class: &str) -> Option<&ClassName> {
        self.classes.get_key_value(class).map(|(k, _)| k)
    }

    /// Whether `class` is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    /// Every field of `class`, inherited first, in declaration order
    #[inline]
    #[must_use]
    pub fn all_fields(&self, class: &str) -> Option<&[FieldDescriptor]> {
        self.classes.get(class).map(|e| e.all_fields.as_slice())
    }

    /// Persisted (non-transient) fields of `class`
    pub fn persisted_fields<'a>(
        &'a self,
        class: &str,
    ) -> Option<impl Iterator<Item = &'a FieldDescriptor> + 'a> {
        self.all_fields(class)
            .map(|fields| fields.iter().filter(|f| f.is_persisted()))
    }

    /// Field `name` of `class`, including inherited fields
    #[must_use]
    pub fn field(&self, class: &str, name: &str) -> Option<&FieldDescriptor> {
        self.all_fields(class)?.iter().find(|f| f.name == name)
    }

    /// Whether `class` is `ancestor` or inherits from it
    #[must_use]
    pub fn is_subclass(&self, class: &str, ancestor: &str) -> bool {
        class == ancestor
            || self
                .classes
                .get(class)
                .is_some_and(|e| e.ancestors.iter().any(|a| a.as_str() == ancestor))
    }

    /// Registered class tags in registration order
    pub fn class_names(&self) -> impl Iterator<Item = &ClassName> {
        self.classes.keys()
    }

    /// Number of classes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// True if no classes are registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Collects class descriptors and validates them into a [`TypeCatalog`]
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    classes: Vec<ClassDescriptor>,
}

impl CatalogBuilder {
    /// Empty builder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class described by a Rust type
    #[must_use]
    pub fn register<T: ModelClass>(self) -> Self {
        self.class(T::descriptor())
    }

    /// Register a class descriptor
    #[must_use]
    pub fn class(mut self, descriptor: ClassDescriptor) -> Self {
        self.classes.push(descriptor);
        self
    }

    /// Validate and freeze
    ///
    /// # Errors
    /// Returns error on duplicate classes or fields, unknown parents,
    /// inheritance cycles, or reserved field names
    pub fn build(self) -> Result<TypeCatalog, CatalogError> {
        let mut by_name: IndexMap<ClassName, ClassDescriptor> = IndexMap::new();
        for desc in self.classes {
            if by_name.contains_key(desc.name()) {
                return Err(CatalogError::DuplicateClass(desc.name().clone()));
            }
            by_name.insert(desc.name().clone(), desc);
        }

        let mut classes = IndexMap::with_capacity(by_name.len());
        for (name, desc) in &by_name {
            let ancestors = ancestors_of(&by_name, desc)?;

            let mut all_fields = Vec::new();
            let mut seen = HashSet::new();
            let chain = ancestors
                .iter()
                .rev()
                .filter_map(|a| by_name.get(a))
                .chain(std::iter::once(desc));
            for class in chain {
                for field in class.own_fields() {
                    if RESERVED_FIELDS.contains(&field.name.as_str()) {
                        return Err(CatalogError::ReservedField {
                            class: name.clone(),
                            field: field.name.clone(),
                        });
                    }
                    if !seen.insert(field.name.as_str()) {
                        return Err(CatalogError::DuplicateField {
                            class: name.clone(),
                            field: field.name.clone(),
                        });
                    }
                    all_fields.push(field.clone());
                }
            }

            classes.insert(
                name.clone(),
                ClassEntry {
                    descriptor: desc.clone(),
                    all_fields,
                    ancestors,
                },
            );
        }

        debug!(classes = classes.len(), "type catalog built");
        Ok(TypeCatalog { classes })
    }
}

fn ancestors_of(
    by_name: &IndexMap<ClassName, ClassDescriptor>,
    desc: &ClassDescriptor,
) -> Result<Vec<ClassName>, CatalogError> {
    let mut ancestors = Vec::new();
    let mut current = desc;
    while let Some(parent) = current.parent() {
        if parent == desc.name() || ancestors.contains(parent) {
            return Err(CatalogError::InheritanceCycle(desc.name().clone()));
        }
        current = by_name.get(parent).ok_or_else(|| CatalogError::UnknownParent {
            class: current.name().clone(),
            parent: parent.clone(),
        })?;
        ancestors.push(parent.clone());
    }
    Ok(ancestors)
}
