//! ECMA-335 metadata and CIL reading.
//!
//! This crate reads a managed portable-executable image far enough to drive
//! ahead-of-time compilation: the PE envelope, the CLI header, the metadata
//! root with its heaps and table stream, blob signatures, method bodies, and
//! CIL opcode decoding.
//!
//! It deliberately reads only what the compiler consumes. Tables the
//! compiler never looks at are still *sized* correctly (the physical table
//! stream cannot be walked otherwise) but get no typed accessors, and any
//! signature element outside the supported subset is a hard
//! [`MetadataError`] rather than a lossy approximation.
//!
//! # Layering
//!
//! - [`image`]: PE envelope, section table, CLI header, RVA resolution
//! - [`heaps`]: `#Strings`, `#US`, `#Blob`, `#GUID`
//! - [`tables`]: `#~` stream header, row sizing, typed row readers
//! - [`signature`]: blob signature parsing into [`signature::SigType`]
//! - [`body`]: tiny/fat method-body headers
//! - [`opcode`]: CIL opcode decoding over a method's code bytes

mod cursor;

pub mod body;
pub mod error;
pub mod heaps;
pub mod image;
pub mod opcode;
pub mod signature;
pub mod tables;

pub use body::MethodBody;
pub use error::MetadataError;
pub use image::Image;
pub use opcode::{IlCursor, OpCode};
pub use signature::{MethodSig, SigType};
pub use tables::{Table, Token};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MetadataError>;
