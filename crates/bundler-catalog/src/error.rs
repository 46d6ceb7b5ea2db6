//! Catalog construction errors

use bundler_model::ClassName;

/// Errors raised while building a [`crate::TypeCatalog`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// Class registered twice
    #[error("class {0} registered twice")]
    DuplicateClass(ClassName),

    /// Parent class not registered
    #[error("class {class} extends unknown class {parent}")]
    UnknownParent {
        /// Class being registered
        class: ClassName,
        /// Parent it names
        parent: ClassName,
    },

    /// Class is its own ancestor
    #[error("inheritance cycle through class {0}")]
    InheritanceCycle(ClassName),

    /// Field declared twice along an inheritance chain
    #[error("field {field} declared twice for class {class}")]
    DuplicateField {
        /// Class whose chain repeats the field
        class: ClassName,
        /// Repeated field name
        field: String,
    },

    /// Field name collides with a document entry key
    #[error("field name {field} on class {class} is reserved")]
    ReservedField {
        /// Declaring class
        class: ClassName,
        /// Reserved name
        field: String,
    },
}
