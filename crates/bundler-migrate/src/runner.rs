//! Applying migrations to documents

use crate::chain::MigrationChain;
use crate::context::MigrationContext;
use crate::error::MigrationError;
use crate::migration::Migration;
use bundler_model::Document;
use tracing::{debug, info};

/// Run `migrations` in order over a copy of `doc`
///
/// After each step the result must parse as a document; its `version` is
/// then stamped with the step's name. `doc` itself is never modified, so a
/// failed chain leaves nothing half-migrated for the caller to persist.
///
/// # Errors
/// - [`MigrationError::StepFailed`] if a migration function fails
/// - [`MigrationError::InvalidOutput`] if a step returns a non-document
pub fn apply_migrations(
    doc: &Document,
    migrations: &[Migration],
    ctx: &MigrationContext,
) -> Result<Document, MigrationError> {
    let from = doc.version.clone();
    let mut current = doc.clone();

    for migration in migrations {
        let value = current.to_value().map_err(MigrationError::Serialize)?;
        let output = migration
            .apply(value, ctx)
            .map_err(|source| MigrationError::StepFailed {
                migration: migration.name().to_string(),
                last_version: current.version.clone(),
                source,
            })?;
        let mut next =
            Document::from_value(output).map_err(|source| MigrationError::InvalidOutput {
                migration: migration.name().to_string(),
                last_version: current.version.clone(),
                source,
            })?;
        next.version = migration.name().to_string();

        debug!(
            migration = migration.name(),
            kind = ?migration.kind(),
            entries = next.len(),
            "migration applied"
        );
        current = next;
    }

    if !migrations.is_empty() {
        info!(
            from = %from,
            to = %current.version,
            steps = migrations.len(),
            "document migrated"
        );
    }
    Ok(current)
}

/// Bring `doc` up to the chain's latest version
///
/// # Errors
/// Returns error if the document's version is not in the chain, or a step
/// fails
pub fn migrate_to_latest(
    doc: &Document,
    chain: &MigrationChain,
    ctx: &MigrationContext,
) -> Result<Document, MigrationError> {
    let steps = chain.migrations_to_execute(&doc.version)?;
    apply_migrations(doc, steps, ctx)
}
