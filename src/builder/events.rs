//! Pipeline event types for JSON output.
//!
//! Emitted one object per line with `--message-format json`. Every event
//! carries a `reason` tag naming what happened.
//!
//! - `stage-started`: a pipeline stage began
//! - `compiler-artifact`: an object file was produced
//! - `compiler-diagnostic`: a compiler printed output or exited non-zero
//! - `archive-updated`: the core archive was written
//! - `image-linked` / `image-packed`: the firmware image was produced
//! - `flash-finished`: the uploader confirmed (or did not confirm) a write
//! - `build-finished`: the run ended

use std::path::PathBuf;

use serde::Serialize;

use crate::core::artifacts::FlashResult;
use crate::core::errors::CompileDiagnostic;

/// Named pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Prepare,
    CompileUser,
    CompileC,
    CompileCxx,
    CompileVariant,
    Archive,
    Link,
    Pack,
    Program,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Prepare => "prepare",
            Stage::CompileUser => "compile-user",
            Stage::CompileC => "compile-c",
            Stage::CompileCxx => "compile-cxx",
            Stage::CompileVariant => "compile-variant",
            Stage::Archive => "archive",
            Stage::Link => "link",
            Stage::Pack => "pack",
            Stage::Program => "program",
        }
    }
}

/// An event emitted while the pipeline runs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason")]
pub enum PipelineEvent {
    #[serde(rename = "stage-started")]
    StageStarted { stage: Stage },

    #[serde(rename = "compiler-artifact")]
    CompilerArtifact { source: PathBuf, object: PathBuf },

    #[serde(rename = "compiler-diagnostic")]
    CompilerDiagnostic {
        source: PathBuf,
        /// Exit code, absent if the compiler was killed
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<i32>,
        /// Whether the object was produced despite the output
        failed: bool,
        message: String,
    },

    #[serde(rename = "archive-updated")]
    ArchiveUpdated { archive: PathBuf, members: usize },

    #[serde(rename = "image-linked")]
    ImageLinked { elf: PathBuf, map: PathBuf },

    #[serde(rename = "image-packed")]
    ImagePacked { bin: PathBuf },

    #[serde(rename = "flash-finished")]
    FlashFinished { port: String, result: FlashResult },

    #[serde(rename = "build-finished")]
    BuildFinished {
        success: bool,
        duration_ms: u64,
        /// Compiler invocations that failed without stopping the run
        compile_failures: usize,
        flashed: bool,
    },
}

impl PipelineEvent {
    pub fn stage(stage: Stage) -> Self {
        PipelineEvent::StageStarted { stage }
    }

    pub fn artifact(source: impl Into<PathBuf>, object: impl Into<PathBuf>) -> Self {
        PipelineEvent::CompilerArtifact {
            source: source.into(),
            object: object.into(),
        }
    }

    pub fn diagnostic(diag: &CompileDiagnostic) -> Self {
        PipelineEvent::CompilerDiagnostic {
            source: diag.source.clone(),
            status: diag.status,
            failed: diag.is_failure(),
            message: diag.output.clone(),
        }
    }
}
