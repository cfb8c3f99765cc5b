//! Resolution errors.
//!
//! Everything here is fatal and aborts the compile before code is emitted:
//! an unresolved handle means the input program is malformed, references an
//! image that is not present, or uses a construct outside the supported
//! subset.

use std::fmt;
use std::path::PathBuf;

use beeb_metadata::MetadataError;

/// Error resolving metadata into type-system entities.
#[derive(Debug)]
pub enum ResolveError {
    /// The underlying image was malformed or unsupported.
    Metadata(MetadataError),
    /// A referenced assembly image could not be located.
    AssemblyNotFound { name: String, searched: PathBuf },
    /// A (namespace, name) lookup found no TypeDef or forwarded type.
    UnknownType { namespace: String, name: String },
    /// A member lookup on a resolved type found no compatible method.
    UnknownMethod { type_name: String, name: String },
    /// A token appeared in a context the compiler does not support
    /// (e.g. a MemberRef through a ModuleRef scope).
    UnsupportedHandle { token: u32, context: &'static str },
    /// A value type directly or transitively contains itself.
    RecursiveLayout { type_name: String },
    /// Internal ordering bug: a size was queried before layout ran.
    LayoutNotReady { type_name: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Metadata(e) => write!(f, "{e}"),
            ResolveError::AssemblyNotFound { name, searched } => {
                write!(
                    f,
                    "referenced assembly `{name}` not found (searched `{}`)",
                    searched.display()
                )
            }
            ResolveError::UnknownType { namespace, name } => {
                if namespace.is_empty() {
                    write!(f, "could not find type definition `{name}`")
                } else {
                    write!(f, "could not find type definition `{namespace}.{name}`")
                }
            }
            ResolveError::UnknownMethod { type_name, name } => {
                write!(f, "could not find method `{name}` on `{type_name}`")
            }
            ResolveError::UnsupportedHandle { token, context } => {
                write!(f, "token {token:#010x} is unsupported as a {context}")
            }
            ResolveError::RecursiveLayout { type_name } => {
                write!(f, "value type `{type_name}` contains itself")
            }
            ResolveError::LayoutNotReady { type_name } => {
                write!(f, "layout of `{type_name}` was queried before being computed")
            }
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::Metadata(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MetadataError> for ResolveError {
    fn from(e: MetadataError) -> Self {
        ResolveError::Metadata(e)
    }
}
