//! Error type for metadata reading.
//!
//! Every variant is fatal: a malformed or unsupported image aborts the
//! compile before any code is emitted.

use std::fmt;
use std::path::PathBuf;

/// Error reading an ECMA-335 image.
#[derive(Debug)]
pub enum MetadataError {
    /// The image file could not be read from disk.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A read ran past the end of the data.
    Truncated { offset: usize, wanted: usize },
    /// The file is not a PE image (bad `MZ`/`PE` signature).
    NotPeImage,
    /// The PE image has no CLI header (not a managed image).
    NotCliImage,
    /// The metadata root signature is not `BSJB`.
    BadMetadataRoot,
    /// A required metadata stream is absent.
    MissingStream { name: &'static str },
    /// An RVA does not fall inside any section.
    RvaOutOfRange { rva: u32 },
    /// A heap offset does not point at a valid entry.
    BadHeapOffset { heap: &'static str, offset: u32 },
    /// A table row index is zero or past the row count.
    RowOutOfRange { table: &'static str, rid: u32 },
    /// A compressed integer in a blob is malformed.
    BadCompressedInt { offset: usize },
    /// A signature blob uses an element type outside the supported subset.
    UnsupportedSignatureElement { element: u8 },
    /// A signature blob has the wrong leading marker for its kind.
    BadSignatureKind { expected: u8, found: u8 },
    /// A method body header is malformed.
    BadMethodBody { rva: u32 },
    /// A branch operand points outside the method body.
    BadBranchTarget { offset: u32 },
    /// A metadata token has an unexpected table for its context.
    UnexpectedToken { token: u32, context: &'static str },
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataError::Io { path, source } => {
                write!(f, "cannot read image `{}`: {source}", path.display())
            }
            MetadataError::Truncated { offset, wanted } => {
                write!(f, "image truncated: wanted {wanted} bytes at offset {offset:#x}")
            }
            MetadataError::NotPeImage => write!(f, "not a PE image"),
            MetadataError::NotCliImage => write!(f, "PE image has no CLI header"),
            MetadataError::BadMetadataRoot => write!(f, "metadata root signature is not BSJB"),
            MetadataError::MissingStream { name } => {
                write!(f, "metadata stream `{name}` is missing")
            }
            MetadataError::RvaOutOfRange { rva } => {
                write!(f, "RVA {rva:#x} falls outside every section")
            }
            MetadataError::BadHeapOffset { heap, offset } => {
                write!(f, "offset {offset:#x} is not valid in the {heap} heap")
            }
            MetadataError::RowOutOfRange { table, rid } => {
                write!(f, "row {rid} is out of range for the {table} table")
            }
            MetadataError::BadCompressedInt { offset } => {
                write!(f, "malformed compressed integer at blob offset {offset:#x}")
            }
            MetadataError::UnsupportedSignatureElement { element } => {
                write!(f, "unsupported signature element type {element:#04x}")
            }
            MetadataError::BadSignatureKind { expected, found } => {
                write!(
                    f,
                    "wrong signature kind: expected marker {expected:#04x}, found {found:#04x}"
                )
            }
            MetadataError::BadMethodBody { rva } => {
                write!(f, "malformed method body at RVA {rva:#x}")
            }
            MetadataError::BadBranchTarget { offset } => {
                write!(f, "branch at IL offset {offset:#06x} targets outside the method")
            }
            MetadataError::UnexpectedToken { token, context } => {
                write!(f, "token {token:#010x} is not valid as a {context}")
            }
        }
    }
}

impl std::error::Error for MetadataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MetadataError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
