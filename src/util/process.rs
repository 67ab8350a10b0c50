//! Subprocess execution utilities.
//!
//! Every external tool the pipeline drives (compiler, archiver, linker,
//! objcopy, uploader) goes through [`ToolRunner`], so stages never touch
//! `std::process` directly.

use std::ffi::OsStr;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::builder::toolchain::CommandSpec;
use crate::core::errors::PipelineError;

/// Polling interval while waiting on a child with a deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Build from a toolchain command spec.
    pub fn from_spec(spec: &CommandSpec) -> Self {
        let mut pb = ProcessBuilder::new(&spec.program).args(&spec.args);
        pb.timeout = spec.timeout;
        pb
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Kill the child if it has not exited after `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    /// Execute the command and wait for completion.
    ///
    /// Returns `ToolInvocation` if the program could not be started and
    /// `ToolTimeout` if a timeout was set and expired.
    pub fn exec(&self) -> Result<Output, PipelineError> {
        let child = self
            .build_command()
            .spawn()
            .map_err(|source| PipelineError::ToolInvocation {
                program: self.program.clone(),
                source,
            })?;

        match self.timeout {
            None => child
                .wait_with_output()
                .map_err(|source| PipelineError::ToolInvocation {
                    program: self.program.clone(),
                    source,
                }),
            Some(timeout) => self.wait_with_deadline(child, timeout),
        }
    }

    fn wait_with_deadline(&self, mut child: Child, timeout: Duration) -> Result<Output, PipelineError> {
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);
        let deadline = Instant::now() + timeout;

        let status = loop {
            let polled = child
                .try_wait()
                .map_err(|source| PipelineError::ToolInvocation {
                    program: self.program.clone(),
                    source,
                })?;

            if let Some(status) = polled {
                break status;
            }

            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                tracing::debug!("killed `{}` after {:?}", self.display_command(), timeout);
                return Err(PipelineError::ToolTimeout {
                    program: self.program.clone(),
                    timeout,
                });
            }

            thread::sleep(POLL_INTERVAL);
        };

        Ok(Output {
            status,
            stdout: join_drain(stdout),
            stderr: join_drain(stderr),
        })
    }

    /// Display the command for logs and error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join_drain(handle: Option<thread::JoinHandle<io::Result<Vec<u8>>>>) -> Vec<u8> {
    handle
        .and_then(|h| h.join().ok())
        .and_then(|r| r.ok())
        .unwrap_or_default()
}

/// Captured result of one tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Successful output with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        ToolOutput {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        ToolOutput {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the tool exited with status 0.
    pub fn succeeded(&self) -> bool {
        self.status == Some(0)
    }

    /// Stdout followed by stderr, the way an operator would see them.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, _) => self.stderr.clone(),
            (false, true) => self.stdout.clone(),
            (false, false) => {
                let mut text = self.stdout.clone();
                if !text.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str(&self.stderr);
                text
            }
        }
    }

    /// Whether the tool printed anything at all.
    pub fn has_output(&self) -> bool {
        !self.stdout.trim().is_empty() || !self.stderr.trim().is_empty()
    }
}

impl From<Output> for ToolOutput {
    fn from(output: Output) -> Self {
        ToolOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Runs tool commands on behalf of the pipeline stages.
pub trait ToolRunner {
    /// Run the command to completion and capture its output.
    ///
    /// A non-zero exit status is NOT an error here; stages decide what a
    /// failing tool means for them.
    fn run(&self, spec: &CommandSpec) -> Result<ToolOutput, PipelineError>;
}

/// Runner that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<ToolOutput, PipelineError> {
        let pb = ProcessBuilder::from_spec(spec);
        tracing::debug!("running `{}`", pb.display_command());
        pb.exec().map(ToolOutput::from)
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_builder() {
        let output = ProcessBuilder::new("echo").arg("hello").exec().unwrap();

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.trim() == "hello" || stdout.contains("hello"));
    }

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("arm-none-eabi-gcc").args(["-c", "a.c", "-o", "a.c.o"]);

        assert_eq!(pb.display_command(), "arm-none-eabi-gcc -c a.c -o a.c.o");
    }

    #[test]
    fn test_missing_program_is_invocation_error() {
        let err = ProcessBuilder::new("definitely-not-a-real-tool-xyz")
            .exec()
            .unwrap_err();
        assert!(matches!(err, PipelineError::ToolInvocation { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let err = ProcessBuilder::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(100))
            .exec()
            .unwrap_err();
        assert!(matches!(err, PipelineError::ToolTimeout { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_captures_output_of_fast_child() {
        let output = ProcessBuilder::new("echo")
            .arg("Write 10 bytes to flash")
            .timeout(Duration::from_secs(5))
            .exec()
            .unwrap();
        assert!(String::from_utf8_lossy(&output.stdout).contains("Write 10 bytes"));
    }

    #[test]
    fn test_tool_output_combined() {
        let out = ToolOutput {
            status: Some(1),
            stdout: "line one".to_string(),
            stderr: "line two\n".to_string(),
        };
        assert_eq!(out.combined(), "line one\nline two\n");
        assert!(!out.succeeded());
        assert!(out.has_output());
        assert!(!ToolOutput::success("  \n").has_output());
    }
}
