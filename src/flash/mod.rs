//! Device programming.
//!
//! [`DeviceProgrammer`] drives one flash attempt through an explicit state
//! machine:
//!
//! ```text
//! Idle -> ResetPending -> UploadInFlight -> Done
//!              |                |
//!              +----------------+-------> Failed
//! ```
//!
//! The reset phase opens the serial port at a low baud rate and closes it
//! again; the upload phase runs the bootloader uploader and reads the
//! confirmed byte count from its transcript.

pub mod serial;
pub mod uploader;

use std::path::Path;
use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::builder::context::BuildContext;
use crate::builder::events::{PipelineEvent, Stage};
use crate::core::artifacts::FlashResult;
use crate::core::config::BuildConfig;
use crate::core::errors::PipelineError;
use crate::util::shell::Status;

pub use serial::{SerialPortReset, SerialReset};

/// Where a flash attempt is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum ProgrammerState {
    Idle,
    ResetPending,
    UploadInFlight,
    Done { bytes_written: u64 },
    Failed,
}

/// How hard to try opening a port that is not enumerated yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetPolicy {
    pub baud: u32,
    /// Total attempts, at least one
    pub attempts: u32,
    /// Pause between attempts
    pub backoff: Duration,
    /// Pause between a successful pulse and the upload
    pub settle: Duration,
}

impl ResetPolicy {
    pub fn from_config(config: &BuildConfig) -> Self {
        ResetPolicy {
            baud: config.reset_baud,
            attempts: config.reset_attempts.max(1),
            backoff: Duration::from_millis(config.reset_backoff_ms),
            settle: Duration::from_millis(config.post_reset_delay_ms),
        }
    }
}

/// Programs the board over its serial bootloader.
pub struct DeviceProgrammer<'c, 'a> {
    ctx: &'c BuildContext<'a>,
    serial: &'c dyn SerialReset,
    policy: ResetPolicy,
    state: ProgrammerState,
}

impl<'c, 'a> DeviceProgrammer<'c, 'a> {
    pub fn new(ctx: &'c BuildContext<'a>, serial: &'c dyn SerialReset) -> Self {
        DeviceProgrammer {
            ctx,
            serial,
            policy: ResetPolicy::from_config(ctx.config),
            state: ProgrammerState::Idle,
        }
    }

    pub fn state(&self) -> ProgrammerState {
        self.state
    }

    fn transition(&mut self, next: ProgrammerState) {
        tracing::debug!("programmer: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Reset the board and upload `bin`.
    ///
    /// Every attempt starts from `Idle`. On error the programmer ends in
    /// `Failed` and the error says which phase failed.
    pub fn program(&mut self, bin: &Path) -> Result<FlashResult, PipelineError> {
        self.transition(ProgrammerState::Idle);
        self.ctx.emit(PipelineEvent::stage(Stage::Program));

        let result = self.run_phases(bin);
        match &result {
            Ok(bytes_written) => self.transition(ProgrammerState::Done {
                bytes_written: *bytes_written,
            }),
            Err(e) => {
                tracing::debug!("flash attempt failed: {}", e);
                self.transition(ProgrammerState::Failed);
            }
        }

        let bytes_written = result?;
        let flash = FlashResult::Confirmed { bytes_written };
        self.ctx.emit(PipelineEvent::FlashFinished {
            port: self.ctx.config.serial_port.clone(),
            result: flash,
        });
        Ok(flash)
    }

    fn run_phases(&mut self, bin: &Path) -> Result<u64, PipelineError> {
        if !bin.is_file() {
            return Err(PipelineError::fs(
                "read",
                bin,
                std::io::Error::new(std::io::ErrorKind::NotFound, "binary image not found"),
            ));
        }

        self.transition(ProgrammerState::ResetPending);
        self.reset()?;

        self.transition(ProgrammerState::UploadInFlight);
        self.upload(bin)
    }

    fn reset(&self) -> Result<(), PipelineError> {
        let device = self.ctx.config.serial_device_path();
        self.ctx
            .shell
            .status(Status::Resetting, format!("{} at {} baud", device, self.policy.baud));

        let mut attempt = 1;
        loop {
            match self.serial.pulse(&device, self.policy.baud) {
                Ok(()) => break,
                Err(PipelineError::DeviceUnavailable { reason, .. }) if attempt < self.policy.attempts => {
                    self.ctx.shell.warn(format!(
                        "{} unavailable ({}), retrying [{}/{}]",
                        device, reason, attempt, self.policy.attempts
                    ));
                    thread::sleep(self.policy.backoff);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }

        if !self.policy.settle.is_zero() {
            thread::sleep(self.policy.settle);
        }
        Ok(())
    }

    fn upload(&self, bin: &Path) -> Result<u64, PipelineError> {
        let config = self.ctx.config;
        let port = &config.serial_port;
        self.ctx
            .shell
            .status(Status::Uploading, format!("{} to {}", bin.display(), port));

        let spec = uploader::upload_command(&config.uploader(), port, bin, config.upload_timeout());
        let output = match self.ctx.run(&spec) {
            Ok(output) => output,
            Err(PipelineError::ToolTimeout { timeout, .. }) => {
                return Err(PipelineError::DeviceNotResponding {
                    port: port.clone(),
                    timeout,
                })
            }
            Err(e) => return Err(e),
        };

        self.ctx.shell.tool_output(&spec.program_name(), &output.combined());
        uploader::interpret(port, &output)
    }
}
