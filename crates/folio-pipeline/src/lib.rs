//! Reproducible build pipeline for folio site packages.
//!
//! A package is described by a `folio.toml` descriptor. Building it runs
//! three stages in order: the toolchain is resolved against `folio.lock`,
//! the generator renders the content tree into a fresh output directory,
//! and the output is installed at the descriptor's destination.
//!
//! ```no_run
//! use std::path::Path;
//! use folio_pipeline::Pipeline;
//!
//! let mut pipeline = Pipeline::load(Path::new("folio.toml"))?;
//! let report = pipeline.run()?;
//! println!("{} -> {}", report.package, report.hash);
//! # Ok::<(), folio_pipeline::PipelineError>(())
//! ```

pub mod descriptor;
pub mod hash;
pub mod install;
pub mod invoke;
pub mod lock;
pub mod pipeline;
pub mod resolve;

pub use descriptor::{Descriptor, DescriptorError, GeneratorSpec, DESCRIPTOR_FILENAME};
pub use hash::{hash_directory, ContentHash, HashError};
pub use install::{InstallError, InstallReport, Installer};
pub use invoke::{
    BuildOutput, BuiltinGenerator, CommandGenerator, GenerateReport, Generator, InvokeError,
    Invoker,
};
pub use lock::{LockError, LockFile, LockedTool, ToolKind, LOCK_FILENAME};
pub use pipeline::{Pipeline, PipelineError, PipelineReport, Stage};
pub use resolve::{Environment, ResolveError, ResolvedTool, Resolver};
