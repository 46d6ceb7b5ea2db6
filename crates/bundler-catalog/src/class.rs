//! Class descriptors and the [`ModelClass`] registration trait

use crate::field::FieldDescriptor;
use bundler_model::ClassName;

/// Declared shape of one model class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDescriptor {
    name: ClassName,
    parent: Option<ClassName>,
    fields: Vec<FieldDescriptor>,
}

impl ClassDescriptor {
    /// Class with no fields and no parent
    #[must_use]
    pub fn new(name: impl Into<ClassName>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
        }
    }

    /// Inherit from `parent`
    #[inline]
    #[must_use]
    pub fn extends(mut self, parent: impl Into<ClassName>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Declare a field (declaration order is encoding order)
    #[inline]
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Declare several fields
    #[must_use]
    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldDescriptor>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Class tag
    #[inline]
    #[must_use]
    pub fn name(&self) -> &ClassName {
        &self.name
    }

    /// Direct parent
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&ClassName> {
        self.parent.as_ref()
    }

    /// Own fields, excluding inherited ones
    #[inline]
    #[must_use]
    pub fn own_fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}

/// A Rust type that stands for a model class
///
/// ```rust,ignore
/// struct Component;
///
/// impl ModelClass for Component {
///     const NAME: &'static str = "Component";
///     const PARENT: Option<&'static str> = Some("Named");
///
///     fn fields() -> Vec<FieldDescriptor> {
///         vec![FieldDescriptor::owned("tree").optional()]
///     }
/// }
/// ```
pub trait ModelClass {
    /// Class tag
    const NAME: &'static str;

    /// Parent class tag
    const PARENT: Option<&'static str> = None;

    /// Own fields in declaration order
    fn fields() -> Vec<FieldDescriptor>;

    /// Full descriptor
    fn descriptor() -> ClassDescriptor {
        let desc = ClassDescriptor::new(Self::NAME).fields(Self::fields());
        match Self::PARENT {
            Some(parent) => desc.extends(parent),
            None => desc,
        }
    }
}
