//! The beeb compiler core: CIL in, 6502 assembly text out.
//!
//! [`compile`] drives the whole pipeline: resolve the root image, find the
//! entry method by unqualified name, then let the [`translate::Translator`]
//! run its worklist to a fixed point and emit code and data through a
//! [`codegen::CodeGenerator`].
//!
//! Compilation is single-threaded and deterministic: emitted label order
//! and symbol naming are part of the output contract, so there is no
//! parallelism here and none should be added.

pub mod codegen;
pub mod error;
pub mod intrinsics;
pub mod translate;
pub mod vtable;

use std::path::Path;

use beeb_types::MetadataStore;

use crate::codegen::bbc::BbcMicroCodeGenerator;
use crate::codegen::CodeGenerator;
pub use crate::error::CompileError;

/// Compile the program at `assembly_path`, starting from the first method
/// whose unqualified name is `entry_point_name`, into BBC Micro assembly
/// text.
pub fn compile(assembly_path: &Path, entry_point_name: &str) -> Result<String, CompileError> {
    let mut generator = BbcMicroCodeGenerator::new();
    compile_with(&mut generator, assembly_path, entry_point_name)
}

/// Compile through a caller-supplied code generator.
pub fn compile_with<G: CodeGenerator>(
    generator: &mut G,
    assembly_path: &Path,
    entry_point_name: &str,
) -> Result<String, CompileError> {
    let mut store = MetadataStore::new(generator.pointer_size());
    let root = store.resolve(assembly_path)?;

    let entry = store
        .find_method_by_simple_name(root, entry_point_name)?
        .ok_or_else(|| CompileError::EntryPointNotFound {
            name: entry_point_name.to_owned(),
        })?;

    tracing::debug!(
        entry = %store.ctx().method(entry).unique_name,
        "starting translation"
    );

    generator.write_header();
    generator.write_entry_point(&store.ctx().method(entry).unique_name);

    let mut translator = translate::Translator::new(&mut store, generator);
    translator.run(entry)?;

    Ok(generator.finish())
}
