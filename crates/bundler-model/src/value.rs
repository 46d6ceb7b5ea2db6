//! Live field values
//!
//! A [`Value`] is what an instance field holds in memory. References to
//! other instances are arena indices ([`Value::Ref`]); whether such a
//! reference owns its target or merely points at it is a property of the
//! field (see the type catalog), never of the value.

use crate::document::Address;
use crate::ids::InstanceId;
use std::collections::BTreeMap;

/// In-memory field value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent / null
    #[default]
    Null,
    /// Boolean scalar
    Bool(bool),
    /// Integer scalar
    Int(i64),
    /// Floating point scalar
    Float(f64),
    /// String scalar
    String(String),
    /// Ordered list
    List(Vec<Value>),
    /// String-keyed plain map
    Map(BTreeMap<String, Value>),
    /// Reference to another instance in the same graph
    Ref(InstanceId),
    /// Weak reference that could not be resolved (loose decoding only)
    Unresolved(Address),
}

impl Value {
    /// True for `Null`, `Bool`, `Int`, `Float` and `String`
    #[inline]
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Null | Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::String(_)
        )
    }

    /// True for `Null`
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Referenced instance, if this is a `Ref`
    #[inline]
    #[must_use]
    pub fn as_ref_id(&self) -> Option<InstanceId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// String contents, if this is a `String`
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// List elements, if this is a `List`
    #[inline]
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Every instance reference nested anywhere in this value, in order
    #[must_use]
    pub fn refs(&self) -> Vec<InstanceId> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs(&self, out: &mut Vec<InstanceId>) {
        match self {
            Self::Ref(id) => out.push(*id),
            Self::List(items) => items.iter().for_each(|v| v.collect_refs(out)),
            Self::Map(entries) => entries.values().for_each(|v| v.collect_refs(out)),
            _ => {}
        }
    }

    /// Short name of the variant, for diagnostics
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Ref(_) => "ref",
            Self::Unresolved(_) => "unresolved",
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<InstanceId> for Value {
    fn from(value: InstanceId) -> Self {
        Self::Ref(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
