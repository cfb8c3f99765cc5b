//! Type system, entity model, and metadata store for the beeb compiler.
//!
//! The split mirrors what the compiler needs at translation time:
//!
//! - [`context`]: the owning [`TypeContext`]: identity-stable interning of
//!   derived type shapes, declared-type layout, and the method/field entity
//!   arenas. Pure in-memory; no image access. Everything is addressed by
//!   copyable ids ([`TypeId`], [`MethodId`], [`FieldId`]) whose equality IS
//!   type/entity identity.
//! - [`store`]: the [`MetadataStore`]: loads ECMA-335 images, materializes
//!   entities into the context lazily and memoized per handle, resolves
//!   cross-assembly references and exported-type forwarding.
//!
//! The context API is the same one the store drives, so type-system
//! behavior (interning identity, the layout invariant, vtable inputs) is
//! exercisable without an image on disk.

pub mod context;
pub mod entity;
pub mod error;
pub mod store;

pub use context::{TypeContext, TypeKind};
pub use entity::{
    FieldData, LocalData, MethodData, MethodSignature, ParamData, PrimitiveKind,
};
pub use error::ResolveError;
pub use store::{AssemblyId, MetadataStore};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Identity of an interned type description.
///
/// Two `TypeId`s are equal exactly when they denote the same type; all type
/// comparisons in the compiler (stack verification, signature matching,
/// well-known checks) are `TypeId` equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

/// Identity of a materialized method entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(pub(crate) u32);

/// Identity of a materialized field entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(pub(crate) u32);
