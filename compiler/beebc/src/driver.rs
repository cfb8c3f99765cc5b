//! The build driver: compile, optionally assemble, write outputs.

use std::fmt;
use std::path::{Path, PathBuf};

use beeb_compile::CompileError;

use crate::assembler::{AssembledImage, Assembler, AssemblerDiagnostic, OutputFormat};
use crate::logger::Logger;

/// What to build and where to put it.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Path to the input program image.
    pub assembly_path: PathBuf,
    /// Unqualified entry method name; the first definition found wins
    /// (ambiguous names are not disambiguated further).
    pub entry_point: String,
    /// Output path; derived from the input when absent.
    pub output: Option<PathBuf>,
    /// Also write the assembler's listing as a `.lst` sidecar.
    pub write_listing: bool,
}

impl BuildOptions {
    pub fn new(assembly_path: PathBuf) -> Self {
        BuildOptions {
            assembly_path,
            entry_point: "Main".to_owned(),
            output: None,
            write_listing: false,
        }
    }
}

/// A finished build.
#[derive(Debug)]
pub struct BuildResult {
    pub assembly_code: String,
    pub output_path: PathBuf,
    /// Present when an assembler was wired in.
    pub image: Option<AssembledImage>,
}

/// Build failure; any error discards all output.
#[derive(Debug)]
pub enum BuildError {
    Compile(CompileError),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The external assembler reported diagnostics (all fatal).
    Assemble(Vec<AssemblerDiagnostic>),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Compile(e) => write!(f, "{e}"),
            BuildError::Io { path, source } => {
                write!(f, "cannot write `{}`: {source}", path.display())
            }
            BuildError::Assemble(diagnostics) => {
                writeln!(f, "assembler reported {} error(s):", diagnostics.len())?;
                for d in diagnostics {
                    writeln!(f, "  {d}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for BuildError {}

impl From<CompileError> for BuildError {
    fn from(e: CompileError) -> Self {
        BuildError::Compile(e)
    }
}

/// The default output path: the input with the extension swapped for
/// `.asm` (no assembler) or the platform image extension.
pub fn default_output_path(input: &Path, assembled: bool) -> PathBuf {
    input.with_extension(if assembled { "ssd" } else { "asm" })
}

/// Compile `options.assembly_path` and write the results.
///
/// With an assembler wired in, the image goes to the output path with
/// `.asm` (and optionally `.lst`) sidecars beside it, matching the build
/// layout the project tooling expects. Without one, the assembly text
/// itself is the output.
pub fn build(
    options: &BuildOptions,
    assembler: Option<&dyn Assembler>,
    logger: &mut dyn Logger,
) -> Result<BuildResult, BuildError> {
    tracing::debug!(
        input = %options.assembly_path.display(),
        entry = %options.entry_point,
        "building"
    );
    let assembly_code = beeb_compile::compile(&options.assembly_path, &options.entry_point)?;

    let output_path = options
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&options.assembly_path, assembler.is_some()));

    let image = match assembler {
        Some(assembler) => {
            let assembled = assembler
                .assemble(&assembly_code, OutputFormat::BbcMicro)
                .map_err(BuildError::Assemble)?;
            write_file(&output_path, &assembled.image)?;
            write_file(
                &output_path.with_extension("asm"),
                assembly_code.as_bytes(),
            )?;
            if options.write_listing {
                write_file(
                    &output_path.with_extension("lst"),
                    assembled.listing.as_bytes(),
                )?;
            }
            Some(assembled)
        }
        None => {
            write_file(&output_path, assembly_code.as_bytes())?;
            if options.write_listing {
                logger.message("note: a listing needs the external assembler; skipped");
            }
            None
        }
    };

    logger.message(&format!("wrote {}", output_path.display()));
    Ok(BuildResult {
        assembly_code,
        output_path,
        image,
    })
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), BuildError> {
    std::fs::write(path, contents).map_err(|source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::BufferLogger;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_outputs_follow_the_input_stem() {
        let input = Path::new("demo/Program.dll");
        assert_eq!(
            default_output_path(input, false),
            Path::new("demo/Program.asm")
        );
        assert_eq!(
            default_output_path(input, true),
            Path::new("demo/Program.ssd")
        );
    }

    #[test]
    fn missing_input_surfaces_a_compile_error() {
        let mut logger = BufferLogger::default();
        let options = BuildOptions::new(PathBuf::from("/nonexistent/missing.dll"));
        let result = build(&options, None, &mut logger);
        match result {
            Err(BuildError::Compile(e)) => {
                assert!(e.to_string().contains("missing.dll"));
            }
            other => panic!("expected a compile error, got {other:?}"),
        }
        assert!(logger.messages.is_empty());
    }
}
