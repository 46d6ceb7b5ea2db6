//! The globally ordered migration chain

use crate::error::ChainError;
use crate::migration::{numeric_prefix, Migration};

/// Ordered migrations after a baseline version
///
/// The baseline is the oldest version any stored document may carry; it has
/// no migration of its own. Every later version is the name of the
/// migration that produces it.
#[derive(Debug, Clone)]
pub struct MigrationChain {
    baseline: String,
    migrations: Vec<Migration>,
}

impl MigrationChain {
    /// Empty chain starting at `baseline`
    #[must_use]
    pub fn new(baseline: impl Into<String>) -> Self {
        Self {
            baseline: baseline.into(),
            migrations: Vec::new(),
        }
    }

    /// Append a migration
    ///
    /// # Errors
    /// Returns error if the name is already taken, or both this name and
    /// the previous one carry numeric prefixes that do not increase
    pub fn push(&mut self, migration: Migration) -> Result<(), ChainError> {
        let name = migration.name();
        if self.contains(name) {
            return Err(ChainError::DuplicateName(name.to_string()));
        }
        let previous = self.latest();
        if let (Some(prev), Some(next)) = (numeric_prefix(previous), numeric_prefix(name)) {
            if next <= prev {
                return Err(ChainError::OutOfOrder {
                    previous: previous.to_string(),
                    name: name.to_string(),
                });
            }
        }
        self.migrations.push(migration);
        Ok(())
    }

    /// Builder form of [`push`](Self::push)
    ///
    /// # Errors
    /// Same as [`push`](Self::push)
    pub fn with(mut self, migration: Migration) -> Result<Self, ChainError> {
        self.push(migration)?;
        Ok(self)
    }

    /// Version a document has before any migration
    #[inline]
    #[must_use]
    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    /// Newest version the chain knows
    #[must_use]
    pub fn latest(&self) -> &str {
        self.migrations
            .last()
            .map_or(self.baseline.as_str(), Migration::name)
    }

    /// All versions, oldest first
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.baseline.as_str()).chain(self.migrations.iter().map(Migration::name))
    }

    /// True if `version` is the baseline or a migration name
    #[must_use]
    pub fn contains(&self, version: &str) -> bool {
        self.position(version).is_some()
    }

    /// Number of migrations (excluding the baseline)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// True when only the baseline exists
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Migrations strictly after `from`, up to the latest
    ///
    /// # Errors
    /// Returns error if `from` is not in the chain
    pub fn migrations_to_execute(&self, from: &str) -> Result<&[Migration], ChainError> {
        let start = self
            .position(from)
            .ok_or_else(|| ChainError::UnknownVersion(from.to_string()))?;
        Ok(&self.migrations[start..])
    }

    /// Migrations strictly after `from`, up to and including `target`
    ///
    /// # Errors
    /// Returns error if either version is unknown or `target` precedes `from`
    pub fn migrations_between(&self, from: &str, target: &str) -> Result<&[Migration], ChainError> {
        let start = self
            .position(from)
            .ok_or_else(|| ChainError::UnknownVersion(from.to_string()))?;
        let end = self
            .position(target)
            .ok_or_else(|| ChainError::UnknownVersion(target.to_string()))?;
        if end < start {
            return Err(ChainError::Backwards {
                from: from.to_string(),
                target: target.to_string(),
            });
        }
        Ok(&self.migrations[start..end])
    }

    /// Number of migrations a document at `version` has already had applied
    fn position(&self, version: &str) -> Option<usize> {
        if version == self.baseline {
            return Some(0);
        }
        self.migrations
            .iter()
            .position(|m| m.name() == version)
            .map(|i| i + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn noop(name: &str) -> Migration {
        Migration::bundled(name, |doc, _| Ok(doc))
    }

    fn chain() -> MigrationChain {
        MigrationChain::new("m0")
            .with(noop("m1"))
            .and_then(|c| c.with(noop("m2")))
            .and_then(|c| c.with(noop("m3")))
            .unwrap()
    }

    fn names(steps: &[Migration]) -> Vec<&str> {
        steps.iter().map(Migration::name).collect()
    }

    #[test]
    fn latest_version_has_nothing_to_run() {
        let chain = chain();
        assert_eq!(chain.latest(), "m3");
        assert!(chain.migrations_to_execute("m3").unwrap().is_empty());
    }

    #[test]
    fn baseline_runs_the_whole_chain() {
        let chain = chain();
        assert_eq!(names(chain.migrations_to_execute("m0").unwrap()), vec!["m1", "m2", "m3"]);
        assert_eq!(chain.versions().collect::<Vec<_>>(), vec!["m0", "m1", "m2", "m3"]);
    }

    #[test]
    fn suffix_after_a_middle_version() {
        let chain = chain();
        assert_eq!(names(chain.migrations_to_execute("m1").unwrap()), vec!["m2", "m3"]);
    }

    #[test]
    fn unknown_versions_are_rejected() {
        let chain = chain();
        assert_eq!(
            chain.migrations_to_execute("m9").unwrap_err(),
            ChainError::UnknownVersion("m9".into())
        );
        assert_eq!(
            chain.migrations_between("m1", "m7").unwrap_err(),
            ChainError::UnknownVersion("m7".into())
        );
    }

    #[test]
    fn between_stops_at_target() {
        let chain = chain();
        assert_eq!(names(chain.migrations_between("m0", "m2").unwrap()), vec!["m1", "m2"]);
        assert!(chain.migrations_between("m2", "m2").unwrap().is_empty());
        assert_eq!(
            chain.migrations_between("m3", "m1").unwrap_err(),
            ChainError::Backwards {
                from: "m3".into(),
                target: "m1".into()
            }
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut chain = chain();
        assert_eq!(chain.push(noop("m2")), Err(ChainError::DuplicateName("m2".into())));
        assert_eq!(chain.push(noop("m0")), Err(ChainError::DuplicateName("m0".into())));
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn numeric_prefixes_must_increase() {
        let mut chain = MigrationChain::new("100-initial");
        chain.push(noop("175-refactor")).unwrap();
        assert_eq!(
            chain.push(noop("150-backport")),
            Err(ChainError::OutOfOrder {
                previous: "175-refactor".into(),
                name: "150-backport".into()
            })
        );
        chain.push(noop("176-split-styles")).unwrap();
        assert_eq!(chain.latest(), "176-split-styles");
    }
}
