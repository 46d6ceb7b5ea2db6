//! Named document transforms

use crate::context::MigrationContext;
use crate::error::BoxError;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

type MigrateFn =
    dyn Fn(serde_json::Value, &MigrationContext) -> Result<serde_json::Value, BoxError> + Send + Sync;

/// How a migration touches the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationKind {
    /// Rewrites the untyped document in place
    Bundled,
    /// May decode and re-encode sub-documents through the codec
    Structural,
}

/// A named, pure transform from one document version to the next
///
/// Operates on the untyped JSON form so it never depends on the current
/// shape of model classes.
#[derive(Clone)]
pub struct Migration {
    name: String,
    kind: MigrationKind,
    func: Arc<MigrateFn>,
}

impl Migration {
    /// Migration rewriting the untyped document
    pub fn bundled<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(serde_json::Value, &MigrationContext) -> Result<serde_json::Value, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            kind: MigrationKind::Bundled,
            func: Arc::new(func),
        }
    }

    /// Migration allowed to re-enter the codec through its context
    pub fn structural<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(serde_json::Value, &MigrationContext) -> Result<serde_json::Value, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            kind: MigrationKind::Structural,
            func: Arc::new(func),
        }
    }

    /// Version a document reaches after this migration
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bundled or structural
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MigrationKind {
        self.kind
    }

    /// Run the transform
    ///
    /// # Errors
    /// Returns whatever the migration function returns
    pub fn apply(
        &self,
        doc: serde_json::Value,
        ctx: &MigrationContext,
    ) -> Result<serde_json::Value, BoxError> {
        (self.func)(doc, ctx)
    }
}

impl Debug for Migration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Leading decimal digits of a migration name (`"175-refactor"` → 175)
pub(crate) fn numeric_prefix(name: &str) -> Option<u64> {
    let end = name
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(name.len(), |(i, _)| i);
    name[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_prefixes() {
        assert_eq!(numeric_prefix("175-refactor"), Some(175));
        assert_eq!(numeric_prefix("42"), Some(42));
        assert_eq!(numeric_prefix("m3"), None);
        assert_eq!(numeric_prefix(""), None);
    }

    #[test]
    fn apply_runs_the_function() {
        let m = Migration::bundled("m2", |mut doc, _| {
            doc["touched"] = json!(true);
            Ok(doc)
        });
        let out = m.apply(json!({}), &MigrationContext::new()).unwrap();
        assert_eq!(out, json!({ "touched": true }));
        assert_eq!(m.kind(), MigrationKind::Bundled);
        assert_eq!(format!("{m:?}"), "Migration { name: \"m2\", kind: Bundled, .. }");
    }
}
