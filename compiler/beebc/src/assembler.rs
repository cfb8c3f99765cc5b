//! The external-assembler boundary.
//!
//! The compiler emits assembly text; turning it into a loadable image is
//! a collaborator's job. Implementations live outside this repository
//! (the build rig wires one in); this module only fixes the contract:
//! text plus an output-format selector in, a diagnostics list or an
//! image plus listing out. Any non-empty diagnostics list aborts the
//! build — there is no partial output.

use std::fmt;

/// Loadable-image formats the driver can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// The BBC Micro's loadable-image format.
    #[default]
    BbcMicro,
}

/// One assembler diagnostic. All diagnostics are fatal.
#[derive(Debug, Clone)]
pub struct AssemblerDiagnostic {
    /// 1-based line in the assembly text, when the assembler knows it.
    pub line: Option<u32>,
    pub message: String,
}

impl fmt::Display for AssemblerDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// A successfully assembled program.
#[derive(Debug, Clone)]
pub struct AssembledImage {
    /// The loadable byte image.
    pub image: Vec<u8>,
    /// The assembler's textual listing.
    pub listing: String,
}

/// An external assembler turning text into a loadable image.
pub trait Assembler {
    fn assemble(
        &self,
        source: &str,
        format: OutputFormat,
    ) -> Result<AssembledImage, Vec<AssemblerDiagnostic>>;
}
