//! Bundler type catalog
//!
//! A compile-time registry of per-class field metadata. The codec never
//! inspects Rust types; it asks the catalog which fields a class has and
//! what [`FieldKind`] each one is.
//!
//! - [`FieldKind`] / [`RefMode`]: how a field's value is linked and encoded
//! - [`FieldDescriptor`], [`ClassDescriptor`]: declared metadata
//! - [`ModelClass`]: implement on a marker type to register a class
//! - [`TypeCatalog`]: validated, immutable lookup table

#![warn(unreachable_pub)]

mod catalog;
mod class;
mod error;
mod field;

pub use catalog::{CatalogBuilder, TypeCatalog};
pub use class::{ClassDescriptor, ModelClass};
pub use error::CatalogError;
pub use field::{FieldDescriptor, FieldKind, RefMode};

/// Common imports
pub mod prelude {
    pub use crate::{ClassDescriptor, FieldDescriptor, FieldKind, ModelClass, RefMode, TypeCatalog};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
