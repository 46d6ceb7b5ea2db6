//! Bundler migrations
//!
//! Stored documents are stamped with the name of the last migration they
//! conform to. Loading an older document replays the missing suffix of the
//! chain over its untyped JSON form before it is decoded.
//!
//! # Core Concepts
//!
//! - [`Migration`]: named transform over `serde_json::Value`
//! - [`MigrationChain`]: globally ordered, append-only list of migrations
//! - [`apply_migrations`]: runs steps over a copy, stamping each version
//! - [`MigrationContext`]: catalog and dependencies for structural steps
//!
//! # Example
//!
//! ```rust,ignore
//! use bundler_migrate::{migrate_to_latest, Migration, MigrationChain, MigrationContext};
//!
//! let chain = MigrationChain::new("174-initial")
//!     .with(Migration::bundled("175-refactor", |mut doc, _| {
//!         // rename a field on every entry
//!         Ok(doc)
//!     }))?;
//! let doc = migrate_to_latest(&stored, &chain, &MigrationContext::new())?;
//! assert_eq!(doc.version, chain.latest());
//! ```

#![warn(unreachable_pub)]

mod chain;
mod context;
mod error;
mod migration;
mod runner;

pub use chain::MigrationChain;
pub use context::MigrationContext;
pub use error::{BoxError, ChainError, ContextError, MigrationError};
pub use migration::{Migration, MigrationKind};
pub use runner::{apply_migrations, migrate_to_latest};

/// Common imports
pub mod prelude {
    pub use crate::{
        apply_migrations, migrate_to_latest, Migration, MigrationChain, MigrationContext,
        MigrationError,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
