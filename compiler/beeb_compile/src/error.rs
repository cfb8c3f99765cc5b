//! Compile errors.
//!
//! Three distinct classes, kept apart so failures triage cleanly:
//!
//! - *resolution*: the input references something that does not exist
//!   ([`CompileError::Resolve`], [`CompileError::EntryPointNotFound`]);
//! - *unsupported construct*: well-formed input using an instruction or
//!   operand type the compiler has no handler for ("add support");
//! - *verification*: the operand stack contradicts an instruction's type
//!   contract ("the input is ill-typed, or a handler's contract is wrong").
//!
//! All are fatal. Nothing is emitted on failure; the driver discards any
//! partial text.

use std::fmt;

use beeb_types::ResolveError;

/// Error during translation.
#[derive(Debug)]
pub enum CompileError {
    /// Metadata resolution failed.
    Resolve(ResolveError),
    /// No method in the root image matches the requested entry name.
    EntryPointNotFound { name: String },
    /// A reached method has no body and is not a known intrinsic.
    MissingBody { method: String },
    /// An instruction outside the supported set was reached.
    UnsupportedInstruction {
        method: String,
        opcode: u16,
        offset: u32,
    },
    /// An instruction was applied to an operand type it has no emission
    /// for (e.g. `add` on floats).
    UnsupportedOperandType {
        method: String,
        op: &'static str,
        ty: String,
    },
    /// Operand stack verification failed: wrong type at an instruction.
    TypeMismatch {
        method: String,
        offset: u32,
        expected: String,
        found: String,
    },
    /// Operand stack verification failed: pop from an empty stack.
    StackUnderflow { method: String, offset: u32 },
    /// A value remained on the operand stack at `ret` from a void method,
    /// or extra values below the return value otherwise.
    NonEmptyStackAtReturn { method: String, depth: usize },
    /// An argument or local index has no slot in the method.
    InvalidSlot {
        method: String,
        offset: u32,
        kind: &'static str,
        index: u16,
    },
    /// A method overrides a virtual, but no ancestor declares a
    /// signature-compatible method of the same name.
    BrokenOverrideChain { method: String },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Resolve(e) => write!(f, "{e}"),
            CompileError::EntryPointNotFound { name } => {
                write!(f, "could not find entry point method `{name}`")
            }
            CompileError::MissingBody { method } => {
                write!(f, "method `{method}` has no body and is not a known intrinsic")
            }
            CompileError::UnsupportedInstruction {
                method,
                opcode,
                offset,
            } => write!(
                f,
                "opcode {opcode:#06x} at IL offset {offset:#06x} in `{method}` is not implemented"
            ),
            CompileError::UnsupportedOperandType { method, op, ty } => {
                write!(f, "`{op}` on operand type `{ty}` in `{method}` is not supported")
            }
            CompileError::TypeMismatch {
                method,
                offset,
                expected,
                found,
            } => write!(
                f,
                "ill-typed program: expected `{expected}`, found `{found}` at IL offset {offset:#06x} in `{method}`"
            ),
            CompileError::StackUnderflow { method, offset } => write!(
                f,
                "ill-typed program: operand stack underflow at IL offset {offset:#06x} in `{method}`"
            ),
            CompileError::NonEmptyStackAtReturn { method, depth } => write!(
                f,
                "ill-typed program: {depth} operand(s) left on the stack at return from `{method}`"
            ),
            CompileError::InvalidSlot {
                method,
                offset,
                kind,
                index,
            } => write!(
                f,
                "ill-typed program: {kind} index {index} out of range at IL offset {offset:#06x} in `{method}`"
            ),
            CompileError::BrokenOverrideChain { method } => {
                write!(f, "`{method}` overrides a method no ancestor declares")
            }
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::Resolve(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ResolveError> for CompileError {
    fn from(e: ResolveError) -> Self {
        CompileError::Resolve(e)
    }
}

impl From<beeb_metadata::MetadataError> for CompileError {
    fn from(e: beeb_metadata::MetadataError) -> Self {
        CompileError::Resolve(ResolveError::Metadata(e))
    }
}
