//! Bootloader uploader (`bossac`) command line and transcript parsing.

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::builder::toolchain::CommandSpec;
use crate::core::artifacts::FlashResult;
use crate::core::errors::PipelineError;
use crate::util::process::ToolOutput;

static CONFIRMATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Write (\d+) bytes to flash").unwrap());

/// Transcript fragments bossac prints when erase, write or verify fails.
const FAILURE_MARKERS: &[&str] = &[
    "verify failed",
    "erase failed",
    "write failed",
    "sam-ba operation failed",
];

/// `bossac --port=<port> -U false -e -w -v -b <bin> -R`
///
/// Erase, write, verify, boot from flash, then reset the board.
pub fn upload_command(uploader: &Path, port: &str, bin: &Path, timeout: Option<Duration>) -> CommandSpec {
    CommandSpec::new(uploader)
        .arg(format!("--port={}", port))
        .args(["-U", "false", "-e", "-w", "-v", "-b"])
        .arg(bin.display().to_string())
        .arg("-R")
        .timeout(timeout)
}

/// Find the confirmed byte count in an uploader transcript.
pub fn parse_upload_output(text: &str) -> FlashResult {
    CONFIRMATION
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .map(|bytes_written| FlashResult::Confirmed { bytes_written })
        .unwrap_or(FlashResult::Unconfirmed)
}

/// Whether the transcript reports an erase, write or verify failure.
pub fn reports_failure(text: &str) -> bool {
    let lower = text.to_lowercase();
    FAILURE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Decide what one uploader run means.
///
/// Explicit failure text is an upload failure. Otherwise a transcript without
/// the confirmation line is a verification failure, whatever the exit status.
/// A confirmed write followed by a non-zero exit is an upload failure.
pub fn interpret(port: &str, output: &ToolOutput) -> Result<u64, PipelineError> {
    let text = output.combined();

    if reports_failure(&text) {
        return Err(upload_failed(port, output, text));
    }

    match parse_upload_output(&text) {
        FlashResult::Unconfirmed => Err(PipelineError::FlashVerification { output: text }),
        FlashResult::Confirmed { .. } if !output.succeeded() => Err(upload_failed(port, output, text)),
        FlashResult::Confirmed { bytes_written } => Ok(bytes_written),
    }
}

fn upload_failed(port: &str, output: &ToolOutput, text: String) -> PipelineError {
    PipelineError::UploadFailed {
        port: port.to_string(),
        status: output.status,
        output: text,
    }
}
