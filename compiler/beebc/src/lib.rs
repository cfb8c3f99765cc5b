//! Build-tool glue around the compiler core.
//!
//! The core produces assembly text; everything here is the boundary
//! around it: the external-assembler trait, the message-sink logger the
//! build tools plug into, and the driver that strings them together and
//! writes output files.

pub mod assembler;
pub mod driver;
pub mod logger;

pub use assembler::{AssembledImage, Assembler, AssemblerDiagnostic, OutputFormat};
pub use driver::{build, BuildError, BuildOptions, BuildResult};
pub use logger::{Logger, StderrLogger};

/// Initialize tracing from `RUST_LOG`, if set. Quiet otherwise.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        let filter = EnvFilter::from_default_env();
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(filter)
            .init();
    }
}
