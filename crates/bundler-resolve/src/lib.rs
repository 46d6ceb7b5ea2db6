//! Bundler dependency resolution
//!
//! Documents list the dependency versions their weak references leave
//! for. Before decoding, those documents (and theirs, transitively) must
//! be fetched from a store and handed to the decoder.
//!
//! # Core Concepts
//!
//! - [`DocumentStore`]: async `VersionId → Document` lookup
//! - [`MemoryStore`] / [`FsStore`]: in-process and directory-backed stores
//! - [`CachedStore`]: moka read-through cache over any store
//! - [`Resolver`]: concurrent breadth-first discovery, leaves-first result
//!
//! # Example
//!
//! ```rust,ignore
//! use bundler_resolve::{CachedStore, FsStore, Resolver};
//!
//! let store = CachedStore::new(FsStore::new("./bundles"), 256);
//! let resolver = Resolver::new(store);
//! let deps = resolver.resolve_dependencies(&doc).await?;
//! let decoded = Decoder::new(&catalog).decode(&doc, &deps)?;
//! ```

#![warn(unreachable_pub)]

mod cache;
mod error;
mod resolver;
mod store;

pub use cache::CachedStore;
pub use error::{ResolveError, StoreError};
pub use resolver::{Resolver, ResolverConfig};
pub use store::{DocumentStore, FsStore, MemoryStore};

/// Common imports
pub mod prelude {
    pub use crate::{DocumentStore, ResolveError, Resolver, ResolverConfig, StoreError};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
