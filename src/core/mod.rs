//! Core data model: configuration, compilation units, artifacts and errors.

pub mod artifacts;
pub mod config;
pub mod errors;
pub mod unit;

pub use artifacts::{BuildArtifactSet, FlashResult, LinkedImage, RawImage};
pub use config::{ArchiveMode, BuildConfig, CompileMode};
pub use errors::{CompileDiagnostic, PipelineError};
pub use unit::{CompilationUnit, Language, SourceOrigin};
