//! Relationship schema: definitions, the immutable registry, and the
//! built-in default schema.

pub mod defaults;
pub mod definition;
pub mod registry;

pub use definition::{
    Cardinality, DefBuilder, RelationshipDef, SourceKind, StorageMode, TargetKind, Validation,
};
pub use registry::{Registry, RegistryBuilder, ReverseView};
