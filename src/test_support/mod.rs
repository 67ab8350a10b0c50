//! Test doubles for the pipeline's external boundaries.
//!
//! - [`FakeToolchain`]: a [`ToolRunner`] that records every command and
//!   simulates what the real tool would leave on disk
//! - [`MockSerial`]: a recording [`SerialReset`]
//!
//! # Example
//!
//! ```rust,ignore
//! let fake = FakeToolchain::new().fail_on("wiring.c ", 1, "error: expected ';'");
//! let ctx = BuildContext::new(&config, &fake, shell).with_toolchain(fake.toolchain());
//! ```

pub mod fixtures;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::builder::toolchain::{ArmToolchain, CommandSpec};
use crate::core::errors::PipelineError;
use crate::flash::SerialReset;
use crate::util::process::{ToolOutput, ToolRunner};

pub use fixtures::*;

#[derive(Debug, Clone)]
enum Response {
    Output(ToolOutput),
    Timeout,
}

#[derive(Debug, Clone)]
struct Rule {
    /// Substring of the displayed command line
    pattern: String,
    response: Response,
}

/// Scriptable stand-in for the cross toolchain and the uploader.
///
/// Without a matching rule each command "succeeds" the way the real tool
/// would: compilers write the `-o` file, `ar rcs` records member names in
/// the archive (one per line, replace semantics), the link writes the image
/// and map, objcopy writes the binary. Every tool first checks that its
/// inputs exist and fails like the real tool if one is missing.
#[derive(Debug, Default)]
pub struct FakeToolchain {
    rules: Vec<Rule>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeToolchain {
    pub fn new() -> Self {
        FakeToolchain::default()
    }

    /// Toolchain whose program names match what the fake expects.
    pub fn toolchain(&self) -> ArmToolchain {
        ArmToolchain::new(
            PathBuf::from("arm-none-eabi-gcc"),
            PathBuf::from("arm-none-eabi-g++"),
            PathBuf::from("arm-none-eabi-ar"),
            PathBuf::from("arm-none-eabi-objcopy"),
        )
    }

    /// Commands containing `pattern` exit with `status` and produce nothing.
    pub fn fail_on(self, pattern: &str, status: i32, stderr: &str) -> Self {
        self.respond(pattern, ToolOutput::failure(status, stderr))
    }

    /// Commands containing `pattern` succeed but print `stdout`.
    pub fn warn_on(self, pattern: &str, stdout: &str) -> Self {
        self.respond(pattern, ToolOutput::success(stdout))
    }

    /// Commands containing `pattern` return `output`.
    pub fn respond(mut self, pattern: &str, output: ToolOutput) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            response: Response::Output(output),
        });
        self
    }

    /// Commands containing `pattern` hit their timeout.
    pub fn time_out_on(mut self, pattern: &str) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            response: Response::Timeout,
        });
        self
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Commands whose program is `tool` or ends in `-tool`.
    pub fn calls_to(&self, tool: &str) -> Vec<CommandSpec> {
        let suffix = format!("-{}", tool);
        self.calls()
            .into_iter()
            .filter(|c| {
                let name = c.program_name();
                name == tool || name.ends_with(&suffix)
            })
            .collect()
    }

    fn simulate(&self, spec: &CommandSpec) -> ToolOutput {
        let result = if spec.has_arg("-Wl,--start-group") {
            simulate_link(spec)
        } else if spec.args.first().map(String::as_str) == Some("rcs") {
            simulate_ar(spec)
        } else if spec.args.first().map(String::as_str) == Some("-O") {
            simulate_objcopy(spec)
        } else if spec.args.iter().any(|a| a.starts_with("--port=")) {
            simulate_upload(spec)
        } else if spec.value_of("-o").is_some() {
            simulate_compile(spec)
        } else {
            Ok(())
        };

        match result {
            Ok(()) => ToolOutput::success(""),
            Err(output) => output,
        }
    }
}

impl ToolRunner for FakeToolchain {
    fn run(&self, spec: &CommandSpec) -> Result<ToolOutput, PipelineError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }

        let line = spec.display();
        let rule = self.rules.iter().find(|r| line.contains(&r.pattern));

        match rule.map(|r| &r.response) {
            Some(Response::Timeout) => Err(PipelineError::ToolTimeout {
                program: spec.program.clone(),
                timeout: spec.timeout.unwrap_or(Duration::from_secs(1)),
            }),
            Some(Response::Output(output)) if !output.succeeded() => Ok(output.clone()),
            Some(Response::Output(output)) => {
                let simulated = self.simulate(spec);
                if simulated.succeeded() {
                    Ok(output.clone())
                } else {
                    Ok(simulated)
                }
            }
            None => Ok(self.simulate(spec)),
        }
    }
}

type Simulated = Result<(), ToolOutput>;

fn require(path: &Path) -> Simulated {
    if path.exists() {
        Ok(())
    } else {
        Err(ToolOutput::failure(
            1,
            format!("{}: No such file or directory\n", path.display()),
        ))
    }
}

fn produce(path: &Path, contents: &[u8]) -> Simulated {
    fs::write(path, contents).map_err(|e| {
        ToolOutput::failure(1, format!("cannot open output file {}: {}\n", path.display(), e))
    })
}

fn simulate_compile(spec: &CommandSpec) -> Simulated {
    let pos = spec.args.iter().position(|a| a == "-o").unwrap_or(0);
    let source = spec.args.get(pos.wrapping_sub(1)).map(PathBuf::from).unwrap_or_default();
    require(&source)?;
    produce(Path::new(spec.value_of("-o").unwrap_or_default()), b"object")
}

fn simulate_ar(spec: &CommandSpec) -> Simulated {
    let archive = PathBuf::from(&spec.args[1]);
    let objects: Vec<PathBuf> = spec.args[2..].iter().map(PathBuf::from).collect();
    for obj in &objects {
        require(obj)?;
    }

    let mut members: BTreeSet<String> = archive_members(&archive).into_iter().collect();
    for obj in &objects {
        if let Some(name) = obj.file_name() {
            members.insert(name.to_string_lossy().into_owned());
        }
    }
    let listing: Vec<String> = members.into_iter().collect();
    produce(&archive, listing.join("\n").as_bytes())
}

fn simulate_link(spec: &CommandSpec) -> Simulated {
    let start = spec.args.iter().position(|a| a == "-Wl,--start-group").unwrap_or(0);
    let end = spec.args.iter().position(|a| a == "-Wl,--end-group").unwrap_or(spec.args.len());
    for input in &spec.args[start + 1..end] {
        require(Path::new(input))?;
    }
    if let Some(script) = spec.args.iter().find_map(|a| a.strip_prefix("-T")) {
        require(Path::new(script))?;
    }

    if let Some(map) = spec.args.iter().find_map(|a| a.strip_prefix("-Wl,-Map,")) {
        produce(Path::new(map), b"Memory Configuration\n")?;
    }
    produce(Path::new(spec.value_of("-o").unwrap_or_default()), b"\x7fELF")
}

fn simulate_objcopy(spec: &CommandSpec) -> Simulated {
    require(Path::new(&spec.args[2]))?;
    produce(Path::new(&spec.args[3]), &[0u8; 16])
}

fn simulate_upload(spec: &CommandSpec) -> Simulated {
    require(Path::new(spec.value_of("-b").unwrap_or_default()))
}

/// Member names recorded by the fake `ar`, sorted. Empty if there is no archive.
pub fn archive_members(archive: &Path) -> Vec<String> {
    fs::read_to_string(archive)
        .map(|text| {
            text.lines()
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Recording serial reset that can be told to fail the first few pulses.
#[derive(Debug, Default)]
pub struct MockSerial {
    pulses: Mutex<Vec<(String, u32)>>,
    failures_left: Mutex<u32>,
    reason: String,
}

impl MockSerial {
    pub fn new() -> Self {
        MockSerial::default()
    }

    /// Fail the next `n` pulses with `DeviceUnavailable`.
    pub fn fail_times(mut self, n: u32, reason: &str) -> Self {
        self.failures_left = Mutex::new(n);
        self.reason = reason.to_string();
        self
    }

    /// Every pulse attempted, as `(device, baud)`.
    pub fn pulses(&self) -> Vec<(String, u32)> {
        self.pulses.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl SerialReset for MockSerial {
    fn pulse(&self, device: &str, baud: u32) -> Result<(), PipelineError> {
        if let Ok(mut pulses) = self.pulses.lock() {
            pulses.push((device.to_string(), baud));
        }

        let mut left = self.failures_left.lock().map_err(|_| PipelineError::DeviceUnavailable {
            port: device.to_string(),
            reason: "mock poisoned".to_string(),
        })?;
        if *left > 0 {
            *left -= 1;
            return Err(PipelineError::DeviceUnavailable {
                port: device.to_string(),
                reason: self.reason.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fake_records_calls_in_order() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.c");
        fs::write(&src, "int a;").unwrap();

        let fake = FakeToolchain::new();
        let tc = fake.toolchain();
        let obj = tmp.path().join("a.c.o");
        let compile = CommandSpec::new(&tc.cc)
            .arg(src.display().to_string())
            .arg("-o")
            .arg(obj.display().to_string());
        assert!(fake.run(&compile).unwrap().succeeded());
        assert!(obj.is_file());

        let archive = tmp.path().join("core.a");
        fake.run(&tc.archive_command(&archive, &[obj.clone()])).unwrap();
        assert_eq!(archive_members(&archive), vec!["a.c.o"]);

        let programs: Vec<String> = fake.calls().iter().map(|c| c.program_name()).collect();
        assert_eq!(programs, vec!["arm-none-eabi-gcc", "arm-none-eabi-ar"]);
    }

    #[test]
    fn test_fake_fails_on_missing_input() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeToolchain::new();
        let cmd = fake
            .toolchain()
            .objcopy_command(&tmp.path().join("missing.elf"), &tmp.path().join("out.bin"));

        let output = fake.run(&cmd).unwrap();
        assert_eq!(output.status, Some(1));
        assert!(output.stderr.contains("No such file"));
        assert!(!tmp.path().join("out.bin").exists());
    }

    #[test]
    fn test_mock_serial_fails_then_succeeds() {
        let serial = MockSerial::new().fail_times(1, "busy");
        assert!(serial.pulse("/dev/ttyACM0", 1200).is_err());
        assert!(serial.pulse("/dev/ttyACM0", 1200).is_ok());
        assert_eq!(serial.pulses().len(), 2);
    }
}
