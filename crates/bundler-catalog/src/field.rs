//! Field metadata
//!
//! Every persisted field of a model class is described by a
//! [`FieldDescriptor`]; its [`FieldKind`] tells the codec how to treat the
//! value it holds.

/// How instance references nested inside a list or plain map are linked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RefMode {
    /// Nested instances are owned by the field and inlined
    #[default]
    Owned,
    /// Nested instances are pointed at, never inlined
    Weak,
}

/// Field kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Primitive, copied by value
    Scalar,
    /// Ordered list; elements may be scalars, nested structure or instances
    List(RefMode),
    /// String-keyed map of nested values
    PlainMap(RefMode),
    /// Strong reference to an instance owned by this field
    OwnedChild,
    /// Non-owning pointer to an instance
    WeakRef,
}

impl FieldKind {
    /// Whether instance references reached through this field are owned
    #[inline]
    #[must_use]
    pub fn owns(self) -> bool {
        matches!(
            self,
            Self::OwnedChild | Self::List(RefMode::Owned) | Self::PlainMap(RefMode::Owned)
        )
    }

    /// Whether the field may hold instance references at all
    #[inline]
    #[must_use]
    pub fn may_reference(self) -> bool {
        !matches!(self, Self::Scalar)
    }

    /// Reference mode for instances reached through this field
    #[must_use]
    pub fn ref_mode(self) -> Option<RefMode> {
        match self {
            Self::Scalar => None,
            Self::OwnedChild => Some(RefMode::Owned),
            Self::WeakRef => Some(RefMode::Weak),
            Self::List(mode) | Self::PlainMap(mode) => Some(mode),
        }
    }

    /// Short name, for diagnostics
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::List(RefMode::Owned) => "list",
            Self::List(RefMode::Weak) => "weak list",
            Self::PlainMap(RefMode::Owned) => "plain map",
            Self::PlainMap(RefMode::Weak) => "weak plain map",
            Self::OwnedChild => "owned child",
            Self::WeakRef => "weak ref",
        }
    }
}

/// One field of a model class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name as it appears in documents
    pub name: String,
    /// Kind
    pub kind: FieldKind,
    /// Excluded from persistence
    pub transient: bool,
    /// Accepts null / may be absent
    pub optional: bool,
}

impl FieldDescriptor {
    /// Field of the given kind
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            transient: false,
            optional: false,
        }
    }

    /// Scalar field
    #[must_use]
    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Scalar)
    }

    /// List whose instances are owned
    #[must_use]
    pub fn list(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::List(RefMode::Owned))
    }

    /// List whose instances are weak references
    #[must_use]
    pub fn weak_list(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::List(RefMode::Weak))
    }

    /// Plain map whose instances are owned
    #[must_use]
    pub fn plain_map(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::PlainMap(RefMode::Owned))
    }

    /// Plain map whose instances are weak references
    #[must_use]
    pub fn weak_map(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::PlainMap(RefMode::Weak))
    }

    /// Owned child
    #[must_use]
    pub fn owned(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::OwnedChild)
    }

    /// Weak reference
    #[must_use]
    pub fn weak(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::WeakRef)
    }

    /// Mark as transient
    #[inline]
    #[must_use]
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    /// Mark as optional
    #[inline]
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Whether the field is written to documents
    #[inline]
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        !self.transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_follows_kind_and_mode() {
        assert!(FieldKind::OwnedChild.owns());
        assert!(FieldKind::List(RefMode::Owned).owns());
        assert!(!FieldKind::List(RefMode::Weak).owns());
        assert!(!FieldKind::WeakRef.owns());
        assert!(!FieldKind::Scalar.owns());
    }

    #[test]
    fn ref_mode_of_kinds() {
        assert_eq!(FieldKind::Scalar.ref_mode(), None);
        assert_eq!(FieldKind::WeakRef.ref_mode(), Some(RefMode::Weak));
        assert_eq!(FieldKind::PlainMap(RefMode::Weak).ref_mode(), Some(RefMode::Weak));
        assert!(!FieldKind::Scalar.may_reference());
    }

    #[test]
    fn builders_set_flags() {
        let field = FieldDescriptor::weak("component").optional();
        assert_eq!(field.kind, FieldKind::WeakRef);
        assert!(field.optional);
        assert!(field.is_persisted());
        assert!(!FieldDescriptor::scalar("cache").transient().is_persisted());
    }
}
