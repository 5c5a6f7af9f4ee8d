//! Cached compilation of Zuri modules.
//!
//! [`Compiler`] is the entry point. It discovers the import graph of a
//! request ([`DependencyGraph`]), fingerprints every module from its source
//! and its dependencies ([`module_fingerprint`]), and reads each module's
//! IR from the [`ArtifactCache`](zuri_cache::ArtifactCache) or builds and
//! inserts it. Every request records the [`BuildState`]s it went through.

#![warn(missing_docs)]

pub mod compiler;
pub mod error;
pub mod fingerprint;
pub mod graph;
pub mod report;
pub mod state;

pub use compiler::{Compiler, CompilerOptions, RunError};
pub use error::{CompileError, DependencyCycleError};
pub use fingerprint::{fragment_fingerprint, module_fingerprint, FingerprintInputs};
pub use graph::{DependencyGraph, ModuleSource};
pub use report::{BuildReport, CompiledModule, ModuleReport, Origin, Program};
pub use state::{BuildState, BuildTrace};
