//! Bundler data model
//!
//! The two shapes a design model takes on its way to and from storage.
//!
//! # Core Concepts
//!
//! - [`Graph`]: arena of live [`Instance`]s; references are [`InstanceId`]s,
//!   so cycles and shared references need no special handling
//! - [`Value`]: in-memory field value
//! - [`Document`]: flat, versioned, serializable form of a graph
//! - [`EncodedValue`] / [`Address`]: field values as they appear on the wire
//! - [`DependencySet`]: foreign documents a decode may resolve into
//! - [`ContentHash`]: Blake3 fingerprint of a document
//!
//! # Example
//!
//! ```rust,ignore
//! use bundler_model::{Graph, Instance};
//!
//! let mut graph = Graph::new();
//! let site = graph.insert(Instance::new("Site").with_new_uuid());
//! let page = graph.insert(Instance::new("Component").with_field("site", site));
//! graph.push_to_list(site, "components", page);
//! ```

#![warn(unreachable_pub)]

mod document;
mod graph;
mod hash;
mod ids;
mod value;

pub use document::{
    Address, DependencySet, Document, DocumentError, EncodedInstance, EncodedValue, OwnedRef,
};
pub use graph::{Graph, Instance};
pub use hash::{ContentHash, HashError};
pub use ids::{ClassName, Iid, InstanceId, VersionId};
pub use value::Value;

pub use uuid::Uuid;

/// Common imports
pub mod prelude {
    pub use crate::{
        Address, ClassName, DependencySet, Document, EncodedInstance, EncodedValue, Graph, Iid,
        Instance, InstanceId, Uuid, Value, VersionId,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
