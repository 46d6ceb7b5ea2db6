//! Codec error types
//!
//! Errors fall into three groups with different handling:
//! - schema mismatches while walking or encoding ([`WalkError`],
//!   [`EncodeError`]): programming errors, never retried
//! - corruption ([`CorruptionError`]): the document itself is
//!   untrustworthy, never retried
//! - unresolved dependencies ([`DecodeError::UnresolvedDependency`]):
//!   recoverable by supplying the missing dependency document

use bundler_model::{ClassName, Iid, InstanceId, Uuid, VersionId};
use std::fmt::{self, Display, Formatter};

/// Live graph does not match the type catalog
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalkError {
    /// Root id is not in the graph
    #[error("root {0} is not in the graph")]
    MissingRoot(InstanceId),

    /// Class not registered
    #[error("instance {id} has unregistered class {class}")]
    UnknownClass {
        /// Offending instance
        id: InstanceId,
        /// Class of the instance
        class: ClassName,
    },

    /// Instance sets a field its class does not declare
    #[error("instance {id} sets undeclared field {class}.{field}")]
    UnknownField {
        /// Offending instance
        id: InstanceId,
        /// Class of the instance
        class: ClassName,
        /// Field name
        field: String,
    },

    /// Required field is unset
    #[error("instance {id} is missing required field {class}.{field}")]
    MissingField {
        /// Offending instance
        id: InstanceId,
        /// Class of the instance
        class: ClassName,
        /// Field name
        field: String,
    },

    /// Value shape contradicts the field kind
    #[error("field {field} of {owner}: expected {expected}, found {found}")]
    ShapeMismatch {
        /// Instance holding the field
        owner: InstanceId,
        /// Field name
        field: String,
        /// Kind the catalog declares
        expected: &'static str,
        /// Kind actually present
        found: &'static str,
    },

    /// Plain map uses a key that collides with reference encoding
    #[error("field {field} of {owner}: plain map uses reserved key {key}")]
    ReservedKey {
        /// Instance holding the field
        owner: InstanceId,
        /// Field name
        field: String,
        /// Reserved key found
        key: &'static str,
    },

    /// Reference to an id outside the graph
    #[error("field {field} of {owner} references {target}, which is not in the graph")]
    DanglingRef {
        /// Instance holding the field
        owner: InstanceId,
        /// Field name
        field: String,
        /// Referenced id
        target: InstanceId,
    },
}

/// Encoding failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// Graph does not match the catalog
    #[error("schema mismatch: {0}")]
    Schema(#[from] WalkError),

    /// Weak target outside the ownership tree has no global id
    #[error("field {field} of {owner} weakly references {target}, which is outside the document and has no uuid")]
    UnaddressableWeakTarget {
        /// Instance holding the field
        owner: InstanceId,
        /// Field name
        field: String,
        /// Referenced id
        target: InstanceId,
    },

    /// NaN or infinite float, which JSON cannot carry
    #[error("field {field} of {owner} holds a non-finite float")]
    NonFiniteFloat {
        /// Instance holding the value
        owner: InstanceId,
        /// Field holding the value
        field: String,
    },
}

/// Structural problem in the ownership tree of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipViolation {
    /// Root entry absent
    MissingRoot {
        /// Declared root
        root: Iid,
    },
    /// Root is owned by another entry
    RootOwned {
        /// Entry owning the root
        owner: Iid,
    },
    /// Entry with no owner
    Orphan {
        /// Offending entry
        iid: Iid,
    },
    /// Entry owned more than once
    MultipleOwners {
        /// Offending entry
        iid: Iid,
        /// Every owning entry
        owners: Vec<Iid>,
    },
    /// Owned reference to an entry that does not exist
    MissingTarget {
        /// Owning entry
        owner: Iid,
        /// Absent iid
        target: Iid,
    },
    /// Entry owned, but not reachable from the root
    Unreachable {
        /// Offending entry
        iid: Iid,
    },
}

impl Display for OwnershipViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRoot { root } => write!(f, "root entry {root} is missing"),
            Self::RootOwned { owner } => write!(f, "root is owned by entry {owner}"),
            Self::Orphan { iid } => write!(f, "entry {iid} has no owner"),
            Self::MultipleOwners { iid, owners } => {
                write!(f, "entry {iid} has {} owners:", owners.len())?;
                for owner in owners {
                    write!(f, " {owner}")?;
                }
                Ok(())
            }
            Self::MissingTarget { owner, target } => {
                write!(f, "entry {owner} owns missing entry {target}")
            }
            Self::Unreachable { iid } => write!(f, "entry {iid} is unreachable from the root"),
        }
    }
}

/// Document violates a structural invariant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorruptionError {
    /// Root entry absent
    #[error("root entry {0} is missing")]
    MissingRoot(Iid),

    /// Map key and `__iid` disagree
    #[error("entry keyed {key} carries iid {iid}")]
    IidMismatch {
        /// Map key
        key: Iid,
        /// `__iid` of the entry
        iid: Iid,
    },

    /// Type tag not in the catalog
    #[error("entry {iid} has unknown type {class}")]
    UnknownClass {
        /// Offending entry
        iid: Iid,
        /// Class of the entry
        class: ClassName,
    },

    /// Field not declared by the entry's class
    #[error("entry {iid} has undeclared field {class}.{field}")]
    UnknownField {
        /// Offending entry
        iid: Iid,
        /// Class of the entry
        class: ClassName,
        /// Field name
        field: String,
    },

    /// Required field absent
    #[error("entry {iid} is missing required field {class}.{field}")]
    MissingField {
        /// Offending entry
        iid: Iid,
        /// Class of the entry
        class: ClassName,
        /// Field name
        field: String,
    },

    /// Encoded value contradicts the field kind
    #[error("field {field} of entry {iid}: expected {expected}, found {found}")]
    ShapeMismatch {
        /// Offending entry
        iid: Iid,
        /// Field name
        field: String,
        /// Kind the catalog declares
        expected: &'static str,
        /// Kind actually present
        found: &'static str,
    },

    /// Reference to an iid absent from the map
    #[error("field {field} of entry {owner} references missing entry {target}")]
    DanglingRef {
        /// Entry holding the field
        owner: Iid,
        /// Field name
        field: String,
        /// Referenced iid
        target: Iid,
    },

    /// Weak reference leaves the document without a uuid
    #[error("field {field} of entry {owner} references {target} outside the document without a uuid")]
    UnaddressableRef {
        /// Entry holding the field
        owner: Iid,
        /// Field name
        field: String,
        /// Referenced iid
        target: Iid,
    },

    /// Weak reference names a local uuid held by a different entry
    #[error("field {field} of entry {owner} references {target} with uuid {uuid}, which entry {holder} carries")]
    WeakRefMismatch {
        /// Entry holding the reference
        owner: Iid,
        /// Field holding the reference
        field: String,
        /// Recorded `iidRef`
        target: Iid,
        /// Recorded uuid
        uuid: Uuid,
        /// Entry that actually carries the uuid
        holder: Iid,
    },

    /// Same uuid on two entries
    #[error("uuid {uuid} appears on entry {iid} and on an earlier entry")]
    DuplicateUuid {
        /// Repeated uuid
        uuid: Uuid,
        /// Later entry carrying it
        iid: Iid,
    },

    /// Ownership tree is broken
    #[error("{} ownership violation(s), first: {}", .0.len(), first_violation(.0))]
    Structure(Vec<OwnershipViolation>),
}

fn first_violation(violations: &[OwnershipViolation]) -> String {
    violations
        .first()
        .map_or_else(String::new, ToString::to_string)
}

/// Decoding failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Primary document is corrupt
    #[error("corrupt document: {0}")]
    Corruption(#[from] CorruptionError),

    /// A supplied dependency document is corrupt
    #[error("corrupt dependency {id}: {source}")]
    CorruptDependency {
        /// Dependency version
        id: VersionId,
        /// What is wrong with it
        #[source]
        source: CorruptionError,
    },

    /// Weak reference into a document that was not supplied
    #[error("field {field} of entry {owner} references {uuid} (iid {iid_ref}), which no supplied document defines")]
    UnresolvedDependency {
        /// Recorded uuid
        uuid: Uuid,
        /// Recorded `iidRef`
        iid_ref: Iid,
        /// Entry holding the field
        owner: Iid,
        /// Field name
        field: String,
        /// Document holding the reference (`None` for the primary document)
        document: Option<VersionId>,
    },
}

impl DecodeError {
    /// Check if retrying with more dependencies could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UnresolvedDependency { .. })
    }

    /// Check if a document is untrustworthy
    #[inline]
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption(_) | Self::CorruptDependency { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unresolved_dependencies_are_retryable() {
        let unresolved = DecodeError::UnresolvedDependency {
            uuid: Uuid::nil(),
            iid_ref: Iid(3),
            owner: Iid(1),
            field: "component".into(),
            document: None,
        };
        assert!(unresolved.is_retryable());
        assert!(!unresolved.is_corruption());

        let corrupt = DecodeError::from(CorruptionError::MissingRoot(Iid::ROOT));
        assert!(!corrupt.is_retryable());
        assert!(corrupt.is_corruption());
    }

    #[test]
    fn structure_error_reports_first_violation() {
        let err = CorruptionError::Structure(vec![
            OwnershipViolation::Orphan { iid: Iid(4) },
            OwnershipViolation::RootOwned { owner: Iid(2) },
        ]);
        assert_eq!(
            err.to_string(),
            "2 ownership violation(s), first: entry 4 has no owner"
        );
    }
}
