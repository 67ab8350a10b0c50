//! Environment and toolchain health checks.
//!
//! ```bash
//! dueflash doctor           # Quick check
//! dueflash doctor --verbose # Paths and versions
//! ```
//!
//! ## Checks Performed
//!
//! - Cross toolchain binaries (gcc, g++, ar, objcopy)
//! - Bootloader uploader
//! - Vendor SDK layout: core sources, variant, linker script, vendor archive
//! - User inputs: user sources and the prebuilt user library
//! - Serial device (optional; the board may simply be unplugged)

use std::fmt::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::builder::toolchain::ArmToolchain;
use crate::core::config::BuildConfig;
use crate::flash::serial::device_exists;
use crate::util::process::ProcessBuilder;

/// How long `<tool> --version` may take.
const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a single health check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    /// Human-readable status message
    pub message: String,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
    /// Whether a failure makes `doctor` exit non-zero
    pub required: bool,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckResult {
            name: name.into(),
            passed: true,
            message: message.into(),
            path: None,
            version: None,
            required: true,
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckResult {
            passed: false,
            ..CheckResult::pass(name, message)
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Summary of all health checks.
#[derive(Debug, Clone, Default)]
pub struct DoctorReport {
    pub checks: Vec<CheckResult>,
    pub total_duration: Duration,
}

impl DoctorReport {
    pub fn new() -> Self {
        DoctorReport::default()
    }

    pub fn add(&mut self, check: CheckResult) {
        self.checks.push(check);
    }

    pub fn all_required_passed(&self) -> bool {
        self.checks.iter().filter(|c| c.required).all(|c| c.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }

    pub fn required_failed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.required && !c.passed).count()
    }
}

/// Options for the doctor command.
#[derive(Debug, Clone, Default)]
pub struct DoctorOptions {
    /// Report tool versions
    pub verbose: bool,
}

/// Check everything a build and flash needs.
///
/// User inputs are looked up relative to `source_root`.
pub fn doctor(config: &BuildConfig, source_root: &Path, options: &DoctorOptions) -> DoctorReport {
    let start = Instant::now();
    let mut report = DoctorReport::new();

    let toolchain = ArmToolchain::from_config(config);
    for (name, path) in toolchain.tools() {
        report.add(check_tool(name, path, options.verbose));
    }

    let uploader = check_file("Uploader", &config.uploader());
    report.add(if config.flash_after_build {
        uploader
    } else {
        uploader.optional()
    });

    report.add(check_dir("Vendor core sources", &config.vendor_core_src_dir()));
    report.add(check_dir("Board variant", &config.target_variant_dir()));
    report.add(check_file("Linker script", &config.linker_script()));
    report.add(check_file("Vendor archive", &config.vendor_archive()));

    for file in &config.user_files {
        report.add(check_file(&format!("User source {}", file), &source_root.join(file)));
    }
    report.add(check_file("User library", &source_root.join(&config.user_library)));

    report.add(check_serial(&config.serial_device_path()));

    report.total_duration = start.elapsed();
    report
}

fn check_tool(name: &str, path: &Path, report_version: bool) -> CheckResult {
    let found = if path.is_file() {
        Some(path.to_path_buf())
    } else if path.components().count() == 1 {
        which::which(path).ok()
    } else {
        None
    };

    let Some(found) = found else {
        return CheckResult::fail(name, format!("{} not found", path.display()));
    };

    let check = CheckResult::pass(name, format!("Found {}", found.display())).with_path(&found);
    if !report_version {
        return check;
    }
    match tool_version(&found) {
        Some(version) => check.with_version(version),
        None => check,
    }
}

/// First line of `<tool> --version`.
fn tool_version(path: &Path) -> Option<String> {
    let output = ProcessBuilder::new(path)
        .arg("--version")
        .timeout(VERSION_TIMEOUT)
        .exec()
        .ok()?;
    let text = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).into_owned()
    } else {
        String::from_utf8_lossy(&output.stdout).into_owned()
    };
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

fn check_file(name: &str, path: &Path) -> CheckResult {
    if path.is_file() {
        CheckResult::pass(name, "present").with_path(path)
    } else {
        CheckResult::fail(name, format!("missing: {}", path.display())).with_path(path)
    }
}

fn check_dir(name: &str, path: &Path) -> CheckResult {
    if path.is_dir() {
        CheckResult::pass(name, "present").with_path(path)
    } else {
        CheckResult::fail(name, format!("missing directory: {}", path.display())).with_path(path)
    }
}

fn check_serial(device: &str) -> CheckResult {
    if device_exists(device) {
        CheckResult::pass("Serial device", format!("{} present", device)).optional()
    } else {
        CheckResult::fail(
            "Serial device",
            format!("{} not found (is the board plugged in?)", device),
        )
        .optional()
    }
}

/// Format the doctor report for display.
pub fn format_report(report: &DoctorReport, verbose: bool) -> String {
    let mut output = String::new();
    // Writing into a String cannot fail
    let _ = write_report(&mut output, report, verbose);
    output
}

fn write_report(output: &mut String, report: &DoctorReport, verbose: bool) -> fmt::Result {
    writeln!(output, "dueflash doctor")?;
    writeln!(output, "===============\n")?;

    writeln!(output, "Checks:")?;
    for check in &report.checks {
        let status = if check.passed { "[OK]" } else { "[!!]" };
        let required = if check.required { "" } else { " (optional)" };
        writeln!(output, "  {} {}{}", status, check.name, required)?;

        if verbose || !check.passed {
            writeln!(output, "      {}", check.message)?;
        }
        if verbose {
            if let Some(path) = &check.path {
                writeln!(output, "      Path: {}", path.display())?;
            }
            if let Some(version) = &check.version {
                writeln!(output, "      Version: {}", version)?;
            }
        }
    }
    writeln!(output)?;

    let failed = report.failed_count();
    let required_failed = report.required_failed_count();
    writeln!(output, "Summary: {} passed, {} failed", report.passed_count(), failed)?;

    if required_failed > 0 {
        writeln!(
            output,
            "\n{} required check(s) failed; `dueflash build` will not succeed.",
            required_failed
        )?;
    } else if failed > 0 {
        writeln!(output, "\nAll required checks passed. {} optional check(s) failed.", failed)?;
    } else {
        writeln!(output, "\nAll checks passed. Ready to build and flash.")?;
    }
    Ok(())
}
