//! Error types for migrations

use bundler_codec::{DecodeError, EncodeError};
use bundler_model::DocumentError;

/// Error returned by a migration function
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Chain construction and lookup errors
///
/// These are programming errors: the chain is fixed at build time and
/// every stored document must carry a version it knows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// Two migrations share a name
    #[error("duplicate migration name: {0}")]
    DuplicateName(String),

    /// Numeric prefix does not increase
    #[error("migration {name} is ordered after {previous}")]
    OutOfOrder {
        /// Migration before it in the chain
        previous: String,
        /// Offending migration
        name: String,
    },

    /// Version not in the chain
    #[error("unknown version: {0}")]
    UnknownVersion(String),

    /// Target precedes the starting version
    #[error("cannot migrate backwards from {from} to {target}")]
    Backwards {
        /// Starting version
        from: String,
        /// Requested target
        target: String,
    },
}

/// Errors from running migrations over a document
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Chain lookup failed
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Input document could not be turned into a value
    #[error("document serialization failed: {0}")]
    Serialize(#[source] DocumentError),

    /// A migration function failed
    #[error("migration {migration} failed (document at {last_version}): {source}")]
    StepFailed {
        /// Failing migration
        migration: String,
        /// Last version successfully reached
        last_version: String,
        /// Underlying error
        #[source]
        source: BoxError,
    },

    /// A migration returned something that is not a document
    #[error("migration {migration} produced an invalid document (from {last_version}): {source}")]
    InvalidOutput {
        /// Offending migration
        migration: String,
        /// Last version successfully reached
        last_version: String,
        /// Parse failure
        #[source]
        source: DocumentError,
    },
}

impl MigrationError {
    /// Name of the migration that failed, if a step failed
    #[must_use]
    pub fn failed_migration(&self) -> Option<&str> {
        match self {
            Self::StepFailed { migration, .. } | Self::InvalidOutput { migration, .. } => {
                Some(migration)
            }
            _ => None,
        }
    }

    /// Version the document had reached before the failing step
    #[must_use]
    pub fn last_version(&self) -> Option<&str> {
        match self {
            Self::StepFailed { last_version, .. } | Self::InvalidOutput { last_version, .. } => {
                Some(last_version)
            }
            _ => None,
        }
    }

    /// Migration failures are deterministic and never retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Errors from codec re-entry inside structural migrations
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// The context carries no type catalog
    #[error("structural migration needs a type catalog")]
    NoCatalog,

    /// Document value did not parse
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Sub-document failed to decode
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Graph failed to encode
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_failure_reports_where_the_chain_broke() {
        let err = MigrationError::StepFailed {
            migration: "176-split-styles".into(),
            last_version: "175-refactor".into(),
            source: "boom".into(),
        };
        assert_eq!(err.failed_migration(), Some("176-split-styles"));
        assert_eq!(err.last_version(), Some("175-refactor"));
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "migration 176-split-styles failed (document at 175-refactor): boom"
        );
    }

    #[test]
    fn chain_errors_carry_no_step() {
        let err = MigrationError::from(ChainError::UnknownVersion("m9".into()));
        assert_eq!(err.failed_migration(), None);
        assert_eq!(err.to_string(), "unknown version: m9");
    }
}
