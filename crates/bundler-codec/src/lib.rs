//! Bundler codec
//!
//! Turns live design-model graphs into flat, versioned documents and back.
//!
//! # Core Concepts
//!
//! - [`GraphWalker`]: catalog-driven traversal over owning edges
//! - [`Encoder`]: graph → [`Document`](bundler_model::Document), deterministic
//! - [`Decoder`]: two-phase (allocate, then fill) document → graph, with
//!   weak references resolved across dependency documents
//! - [`IncrementalEncoder`]: keeps a document in step with an edited graph,
//!   re-encoding only the instances that changed
//! - [`refs`]: catalog-free reference checks and pruning on documents
//! - [`compare`]: graph isomorphism for round-trip verification
//!
//! # Example
//!
//! ```rust,ignore
//! use bundler_codec::{Decoder, Encoder};
//! use bundler_model::DependencySet;
//!
//! let doc = Encoder::new(&catalog).encode(&graph, root, "175-refactor")?;
//! let decoded = Decoder::new(&catalog).decode(&doc, &DependencySet::new())?;
//! assert!(bundler_codec::compare::is_isomorphic(&graph, root, &decoded.graph, decoded.root));
//! ```

#![warn(unreachable_pub)]

pub mod compare;
mod decoder;
mod encoder;
mod error;
mod incremental;
pub mod refs;
mod walker;

pub use decoder::{DecodeOptions, Decoded, Decoder};
pub use encoder::Encoder;
pub use error::{CorruptionError, DecodeError, EncodeError, OwnershipViolation, WalkError};
pub use incremental::{Change, IncrementalEncoder, RefSlot};
pub use refs::{check_ownership, check_references, external_refs, prune_unreachable, visit_refs};
pub use walker::{FieldVisit, GraphWalker};

/// Common imports
pub mod prelude {
    pub use crate::{DecodeError, DecodeOptions, Decoded, Decoder, EncodeError, Encoder, GraphWalker};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
