//! Pipeline error types and diagnostics.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// A fatal pipeline failure. Any of these aborts the remaining stages.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum PipelineError {
    #[error("failed to {action} `{}`", path.display())]
    #[diagnostic(code(dueflash::workspace::filesystem))]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to run `{}`", program.display())]
    #[diagnostic(code(dueflash::tool::invocation))]
    ToolInvocation {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("`{}` did not finish within {}s", program.display(), timeout.as_secs())]
    #[diagnostic(code(dueflash::tool::timeout))]
    ToolTimeout { program: PathBuf, timeout: Duration },

    #[error("compilation failed for `{}`", source_file.display())]
    #[diagnostic(code(dueflash::compile::failed))]
    Compile {
        source_file: PathBuf,
        status: Option<i32>,
        output: String,
    },

    #[error("archiving failed for `{}`", archive.display())]
    #[diagnostic(code(dueflash::archive::failed))]
    Archive { archive: PathBuf, output: String },

    #[error("linking failed for `{}`", image.display())]
    #[diagnostic(code(dueflash::link::failed))]
    Link { image: PathBuf, output: String },

    #[error("packing failed for `{}`", image.display())]
    #[diagnostic(code(dueflash::pack::failed))]
    Pack { image: PathBuf, output: String },

    #[error("serial port `{port}` is unavailable: {reason}")]
    #[diagnostic(code(dueflash::flash::device_unavailable))]
    DeviceUnavailable { port: String, reason: String },

    #[error("device on `{port}` did not respond within {}s", timeout.as_secs())]
    #[diagnostic(code(dueflash::flash::not_responding))]
    DeviceNotResponding { port: String, timeout: Duration },

    #[error("uploader reported a failure programming `{port}`")]
    #[diagnostic(code(dueflash::flash::upload_failed))]
    UploadFailed {
        port: String,
        status: Option<i32>,
        output: String,
    },

    #[error("flash verification failed: uploader did not confirm a write")]
    #[diagnostic(
        code(dueflash::flash::verification_failed),
        help("the image was built but the device was not programmed")
    )]
    FlashVerification { output: String },
}

impl PipelineError {
    /// Wrap an io error from a filesystem step.
    pub fn fs(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        PipelineError::Filesystem {
            action,
            path: path.into(),
            source,
        }
    }

    /// Whether the image was built before this error happened.
    pub fn image_was_built(&self) -> bool {
        matches!(
            self,
            PipelineError::DeviceUnavailable { .. }
                | PipelineError::DeviceNotResponding { .. }
                | PipelineError::UploadFailed { .. }
                | PipelineError::FlashVerification { .. }
        )
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            PipelineError::Filesystem { source, .. } => diag
                .with_context(source.to_string())
                .with_suggestion(suggestions::CHECK_INPUTS),
            PipelineError::ToolInvocation { source, .. } => diag
                .with_context(source.to_string())
                .with_suggestion(suggestions::RUN_DOCTOR),
            PipelineError::ToolTimeout { .. } => diag.with_suggestion(suggestions::RUN_DOCTOR),
            PipelineError::Compile { status, output, .. } => diag
                .with_context(format!("exit status: {}", describe_status(*status)))
                .with_context(tail(output))
                .with_suggestion(suggestions::LENIENT_MODE),
            PipelineError::Archive { output, .. }
            | PipelineError::Pack { output, .. } => diag.with_context(tail(output)),
            PipelineError::Link { output, .. } => diag
                .with_context(tail(output))
                .with_suggestion(suggestions::CHECK_MAP),
            PipelineError::DeviceUnavailable { .. } => diag
                .with_suggestion(suggestions::CHECK_PORT)
                .with_suggestion(suggestions::RESET_RETRIES),
            PipelineError::DeviceNotResponding { .. } => diag
                .with_context("the image was built but not programmed")
                .with_suggestion(suggestions::PRESS_ERASE),
            PipelineError::UploadFailed { status, output, .. } => diag
                .with_context(format!("exit status: {}", describe_status(*status)))
                .with_context(tail(output))
                .with_suggestion(suggestions::PRESS_ERASE),
            PipelineError::FlashVerification { output } => diag
                .with_context("the image was built but not programmed")
                .with_context(tail(output))
                .with_suggestion(suggestions::PRESS_ERASE),
        }
    }
}

/// A compiler invocation that failed or complained without stopping the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileDiagnostic {
    pub source: PathBuf,
    pub status: Option<i32>,
    pub output: String,
}

impl CompileDiagnostic {
    /// Whether the compiler exited non-zero (the object was not produced).
    pub fn is_failure(&self) -> bool {
        self.status != Some(0)
    }
}

fn describe_status(status: Option<i32>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "terminated by signal".to_string(),
    }
}

/// Last few lines of tool output, enough to place the failure.
fn tail(output: &str) -> String {
    const LINES: usize = 8;
    let lines: Vec<&str> = output.trim_end().lines().collect();
    let start = lines.len().saturating_sub(LINES);
    if lines.is_empty() {
        "(no output)".to_string()
    } else {
        lines[start..].join("\n    ")
    }
}
