//! Error types for dependency resolution

use bundler_migrate::MigrationError;
use bundler_model::VersionId;

/// Errors from a [`DocumentStore`](crate::DocumentStore)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No document stored under this id
    #[error("document not found: {0}")]
    NotFound(VersionId),

    /// Store could not be reached
    #[error("store unavailable for {id}: {reason}")]
    Unavailable {
        /// Requested id
        id: VersionId,
        /// Underlying failure
        reason: String,
    },

    /// Stored bytes are not a document
    #[error("invalid document {id}: {reason}")]
    Invalid {
        /// Requested id
        id: VersionId,
        /// Parse failure
        reason: String,
    },
}

impl StoreError {
    /// Not-found and unavailable are transient from the caller's view
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Unavailable { .. })
    }
}

/// Errors from resolving a document's dependencies
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// A dependency is not in the store
    #[error("missing dependency {id}{}", required_by_suffix(.required_by.as_ref()))]
    MissingDependency {
        /// Missing version
        id: VersionId,
        /// Dependency that listed it, `None` for the document being resolved
        required_by: Option<VersionId>,
    },

    /// The store failed transiently
    #[error("dependency {id} unavailable: {reason}")]
    Unavailable {
        /// Requested version
        id: VersionId,
        /// Underlying failure
        reason: String,
    },

    /// A stored dependency is not a valid document
    #[error("dependency {id} is corrupt: {reason}")]
    Corrupt {
        /// Offending version
        id: VersionId,
        /// What is wrong with it
        reason: String,
    },

    /// Dependencies depend on each other
    #[error("dependency cycle through {0}")]
    Cycle(VersionId),

    /// A dependency could not be migrated to the current version
    #[error("dependency {id} failed to migrate: {source}")]
    Migration {
        /// Dependency being migrated
        id: VersionId,
        /// Underlying failure
        #[source]
        source: MigrationError,
    },
}

fn required_by_suffix(required_by: Option<&VersionId>) -> String {
    required_by.map_or_else(String::new, |by| format!(" (required by {by})"))
}

impl ResolveError {
    /// Build from a store error for `id`
    pub(crate) fn from_store(error: StoreError, required_by: Option<VersionId>) -> Self {
        match error {
            StoreError::NotFound(id) => Self::MissingDependency { id, required_by },
            StoreError::Unavailable { id, reason } => Self::Unavailable { id, reason },
            StoreError::Invalid { id, reason } => Self::Corrupt { id, reason },
        }
    }

    /// Supplying or reaching the dependency later may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::MissingDependency { .. } | Self::Unavailable { .. })
    }

    /// A stored document or the dependency graph itself is broken
    #[inline]
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupt { .. } | Self::Cycle(_))
    }
}
