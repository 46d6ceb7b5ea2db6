//! The flat, versioned document ("bundle") format
//!
//! A [`Document`] is what the encoder produces and the store persists:
//!
//! ```text
//! {
//!   "version": "175-refactor-data-model",
//!   "root": 0,
//!   "map": {
//!     "0": { "__type": "Site", "__iid": 0, "__uuid": "…", "components": [{ "__ref": 1 }] },
//!     "1": { "__type": "Component", "__iid": 1, "site": { "iidRef": 0, "uuid": "…" } }
//!   },
//!   "deps": ["pkg-version-id"]
//! }
//! ```
//!
//! Owned children are `{"__ref": iid}`; weak references are addresses
//! `{"iidRef": iid, "uuid": …}`. The keys `__ref`, `iidRef` and `uuid` are
//! therefore reserved inside plain maps.

use crate::hash::{ContentHash, HashError};
use crate::ids::{ClassName, Iid, VersionId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use uuid::Uuid;

/// Weak-reference pointer: local id plus optional global id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Address {
    /// Local id of the target in the document that wrote this address
    pub iid_ref: Iid,
    /// Stable global id of the target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
}

impl Address {
    /// Address with both ids
    #[inline]
    #[must_use]
    pub fn new(iid_ref: Iid, uuid: Option<Uuid>) -> Self {
        Self { iid_ref, uuid }
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.uuid {
            Some(uuid) => write!(f, "{uuid} {}", self.iid_ref),
            None => write!(f, "- {}", self.iid_ref),
        }
    }
}

/// Same-document owning reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OwnedRef {
    /// Local id of the owned entry
    #[serde(rename = "__ref")]
    pub iid: Iid,
}

/// Encoded field value
///
/// Untagged on the wire; variant order matters for deserialization
/// (reference shapes are tried before plain maps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EncodedValue {
    /// JSON null
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    String(String),
    /// Owned child, by local id
    Ref(OwnedRef),
    /// Weak reference
    Weak(Address),
    /// Array
    List(Vec<EncodedValue>),
    /// Plain object
    Map(BTreeMap<String, EncodedValue>),
}

impl EncodedValue {
    /// Owned-child reference to `iid`
    #[inline]
    #[must_use]
    pub fn owned(iid: Iid) -> Self {
        Self::Ref(OwnedRef { iid })
    }

    /// Weak reference to `iid`
    #[inline]
    #[must_use]
    pub fn weak(iid: Iid, uuid: Option<Uuid>) -> Self {
        Self::Weak(Address::new(iid, uuid))
    }

    /// True for the scalar variants (including null)
    #[inline]
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Null | Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::String(_)
        )
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
            Self::Ref(_) => "ref",
            Self::Weak(_) => "weak ref",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

/// One entry of a document's `map`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedInstance {
    /// Class tag
    #[serde(rename = "__type")]
    pub class: ClassName,
    /// Local id (matches the map key)
    #[serde(rename = "__iid")]
    pub iid: Iid,
    /// Global id, when the instance has one
    #[serde(rename = "__uuid", default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    /// Persisted fields by name
    #[serde(flatten)]
    pub fields: BTreeMap<String, EncodedValue>,
}

impl EncodedInstance {
    /// Entry with no fields
    #[must_use]
    pub fn new(class: impl Into<ClassName>, iid: Iid) -> Self {
        Self {
            class: class.into(),
            iid,
            uuid: None,
            fields: BTreeMap::new(),
        }
    }

    /// Field by name
    #[inline]
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&EncodedValue> {
        self.fields.get(name)
    }
}

/// Serialized graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Name of the last migration this document conforms to
    pub version: String,
    /// Local id of the root entry
    pub root: Iid,
    /// All entries, by local id
    pub map: BTreeMap<Iid, EncodedInstance>,
    /// Dependency documents that weak references leave this document for
    #[serde(default)]
    pub deps: Vec<VersionId>,
}

impl Document {
    /// Empty document rooted at `root`
    #[must_use]
    pub fn new(version: impl Into<String>, root: Iid) -> Self {
        Self {
            version: version.into(),
            root,
            map: BTreeMap::new(),
            deps: Vec::new(),
        }
    }

    /// Root entry, if present
    #[inline]
    #[must_use]
    pub fn root_entry(&self) -> Option<&EncodedInstance> {
        self.map.get(&self.root)
    }

    /// Entry by local id
    #[inline]
    #[must_use]
    pub fn get(&self, iid: Iid) -> Option<&EncodedInstance> {
        self.map.get(&iid)
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if the map is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Entry count per class
    #[must_use]
    pub fn class_histogram(&self) -> BTreeMap<ClassName, usize> {
        let mut out = BTreeMap::new();
        for entry in self.map.values() {
            *out.entry(entry.class.clone()).or_insert(0) += 1;
        }
        out
    }

    /// Compact JSON
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json_string(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Indented JSON
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse JSON text
    ///
    /// # Errors
    /// Returns error if the text is not a well-formed document
    pub fn from_json_str(json: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loosely typed form, as migrations see it
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_value(&self) -> Result<serde_json::Value, DocumentError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parse the loosely typed form
    ///
    /// # Errors
    /// Returns error if the value is not a well-formed document
    pub fn from_value(value: serde_json::Value) -> Result<Self, DocumentError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Blake3 of the compact JSON encoding
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn fingerprint(&self) -> Result<ContentHash, HashError> {
        ContentHash::compute_serializable(self)
    }
}

/// Dependency documents by version id, in load order (leaves first)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencySet {
    documents: IndexMap<VersionId, Document>,
}

impl DependencySet {
    /// Empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a document; replaces (keeping position) if already present
    pub fn insert(&mut self, id: VersionId, document: Document) -> Option<Document> {
        self.documents.insert(id, document)
    }

    /// Document by id
    #[inline]
    #[must_use]
    pub fn get(&self, id: &VersionId) -> Option<&Document> {
        self.documents.get(id)
    }

    /// Whether `id` is present
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &VersionId) -> bool {
        self.documents.contains_key(id)
    }

    /// Ids in load order
    pub fn ids(&self) -> impl Iterator<Item = &VersionId> {
        self.documents.keys()
    }

    /// Documents with their ids, in load order
    pub fn iter(&self) -> impl Iterator<Item = (&VersionId, &Document)> {
        self.documents.iter()
    }

    /// Number of documents
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// True if no documents
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl FromIterator<(VersionId, Document)> for DependencySet {
    fn from_iter<I: IntoIterator<Item = (VersionId, Document)>>(iter: I) -> Self {
        Self {
            documents: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for DependencySet {
    type Item = (VersionId, Document);
    type IntoIter = indexmap::map::IntoIter<VersionId, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}

/// Document (de)serialization errors
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Malformed JSON or wrong shape
    #[error("invalid document: {0}")]
    Json(#[from] serde_json::Error),
}
