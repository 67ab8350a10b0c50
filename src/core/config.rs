//! Build configuration.
//!
//! Every path, flag group and file list the pipeline uses lives in
//! [`BuildConfig`]. The defaults reproduce an Arduino Due build against the
//! 1.5.2 SDK layout; a `Dueflash.toml` can override any of them.
//!
//! Configuration locations:
//! - Global: `~/.dueflash/config.toml` - user-wide defaults (SDK location, port)
//! - Project: `Dueflash.toml` - project-specific overrides
//!
//! Project config takes precedence over global config. Directory settings
//! left unset are derived from `vendor_sdk_dir`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::unit::{base_name, units_for, CompilationUnit, Language, SourceOrigin};

/// Project configuration file name.
pub const CONFIG_FILE_NAME: &str = "Dueflash.toml";

/// How compiler exit statuses are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompileMode {
    /// Print diagnostics and keep going
    #[default]
    Lenient,
    /// Abort on the first non-zero compiler exit
    Strict,
}

/// How objects are put into the core archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveMode {
    /// One `ar` call for all objects after the last compile
    #[default]
    Batched,
    /// One `ar` call per object, right after it is compiled
    Incremental,
}

/// Immutable configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Program the board after packing
    pub flash_after_build: bool,

    /// Serial port name as the uploader expects it (e.g. `ttyACM0`)
    pub serial_port: String,

    /// Build output directory (wiped on every run)
    pub build_dir: PathBuf,

    /// Root of the vendor SDK installation
    pub vendor_sdk_dir: PathBuf,

    /// Directory holding the cross toolchain; empty means search PATH
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain_bin_dir: Option<PathBuf>,

    /// Board variant directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_variant_dir: Option<PathBuf>,

    /// Vendor core source directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_core_src_dir: Option<PathBuf>,

    /// Bootloader uploader executable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader: Option<PathBuf>,

    /// Toolchain executable prefix
    pub tool_prefix: String,

    /// Generic compile flags
    pub cflags: String,

    /// C++-only compile flags
    pub cxxflags: String,

    /// Target and define flags
    pub target_flags: String,

    /// Include directories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_paths: Option<Vec<PathBuf>>,

    /// User sources, staged into the build directory
    pub user_files: Vec<String>,

    /// Prebuilt user library, staged into the build directory
    pub user_library: String,

    /// Vendor core C sources
    pub c_files: Vec<String>,

    /// Vendor core C++ sources
    pub cpp_files: Vec<String>,

    /// Board variant sources
    pub variant_files: Vec<String>,

    /// CPU passed to the link driver
    pub cpu: String,

    /// Linker script, default `<variant>/linker_scripts/gcc/flash.ld`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linker_script: Option<PathBuf>,

    /// Vendor prebuilt archive, default `<variant>/libsam_sam3x8e_gcc_rel.a`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_archive: Option<PathBuf>,

    /// Object linked explicitly ahead of the archives
    pub syscalls_object: String,

    /// Entry symbol for the linked image
    pub entry_symbol: String,

    /// Archive the core objects are collected into
    pub core_archive: String,

    pub compile_mode: CompileMode,
    pub archive_mode: ArchiveMode,

    /// Baud rate of the bootloader reset pulse
    pub reset_baud: u32,

    /// Attempts at opening the port for the reset pulse
    pub reset_attempts: u32,

    /// Delay between reset attempts
    pub reset_backoff_ms: u64,

    /// Delay between the reset pulse and the upload
    pub post_reset_delay_ms: u64,

    /// Uploader timeout; 0 disables it
    pub upload_timeout_secs: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            flash_after_build: true,
            serial_port: "ttyACM0".to_string(),
            build_dir: PathBuf::from("build"),
            vendor_sdk_dir: PathBuf::from("arduino-1.5.2"),
            toolchain_bin_dir: None,
            target_variant_dir: None,
            vendor_core_src_dir: None,
            uploader: None,
            tool_prefix: "arm-none-eabi-".to_string(),
            cflags: "-c -g -Os -w -ffunction-sections -fdata-sections -nostdlib \
                     --param max-inline-insns-single=500"
                .to_string(),
            cxxflags: "-fno-rtti -fno-exceptions".to_string(),
            target_flags: "-Dprintf=iprintf -mcpu=cortex-m3 -DF_CPU=84000000L -DARDUINO=152 \
                           -D__SAM3X8E__ -mthumb -DUSB_PID=0x003e -DUSB_VID=0x2341 -DUSBCON"
                .to_string(),
            include_paths: None,
            user_files: vec!["mruby.cpp".to_string()],
            user_library: "libmruby.a".to_string(),
            c_files: strings(&[
                "WInterrupts.c",
                "syscalls_sam3.c",
                "cortex_handlers.c",
                "wiring.c",
                "wiring_digital.c",
                "itoa.c",
                "wiring_shift.c",
                "wiring_analog.c",
                "hooks.c",
                "iar_calls_sam3.c",
            ]),
            cpp_files: strings(&[
                "main.cpp",
                "WString.cpp",
                "RingBuffer.cpp",
                "UARTClass.cpp",
                "cxxabi-compat.cpp",
                "USARTClass.cpp",
                "USB/CDC.cpp",
                "USB/HID.cpp",
                "USB/USBCore.cpp",
                "Reset.cpp",
                "Stream.cpp",
                "Print.cpp",
                "WMath.cpp",
                "IPAddress.cpp",
                "wiring_pulse.cpp",
            ]),
            variant_files: vec!["variant.cpp".to_string()],
            cpu: "cortex-m3".to_string(),
            linker_script: None,
            vendor_archive: None,
            syscalls_object: "syscalls_sam3.c.o".to_string(),
            entry_symbol: "Reset_Handler".to_string(),
            core_archive: "core.a".to_string(),
            compile_mode: CompileMode::Lenient,
            archive_mode: ArchiveMode::Batched,
            reset_baud: 1200,
            reset_attempts: 1,
            reset_backoff_ms: 500,
            post_reset_delay_ms: 0,
            upload_timeout_secs: 60,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl BuildConfig {
    /// Load configuration from a file; unset fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config")
    }

    /// Make relative paths absolute against `base`.
    pub fn rooted_at(mut self, base: &Path) -> Self {
        let root = |p: &mut PathBuf| {
            if p.is_relative() && !p.as_os_str().is_empty() {
                *p = base.join(&*p);
            }
        };
        root(&mut self.build_dir);
        root(&mut self.vendor_sdk_dir);
        for p in [
            &mut self.toolchain_bin_dir,
            &mut self.target_variant_dir,
            &mut self.vendor_core_src_dir,
            &mut self.uploader,
            &mut self.linker_script,
            &mut self.vendor_archive,
        ]
        .into_iter()
        .flatten()
        {
            root(p);
        }
        if let Some(ref mut includes) = self.include_paths {
            includes.iter_mut().for_each(root);
        }
        self
    }

    /// SAM platform directory inside the SDK.
    pub fn sam_dir(&self) -> PathBuf {
        self.vendor_sdk_dir.join("hardware").join("arduino").join("sam")
    }

    /// Toolchain bin directory, `None` when tools come from PATH.
    pub fn toolchain_bin_dir(&self) -> Option<PathBuf> {
        match &self.toolchain_bin_dir {
            Some(dir) if dir.as_os_str().is_empty() => None,
            Some(dir) => Some(dir.clone()),
            None => Some(
                self.vendor_sdk_dir
                    .join("hardware")
                    .join("tools")
                    .join("g++_arm_none_eabi")
                    .join("bin"),
            ),
        }
    }

    pub fn target_variant_dir(&self) -> PathBuf {
        self.target_variant_dir
            .clone()
            .unwrap_or_else(|| self.sam_dir().join("variants").join("arduino_due_x"))
    }

    pub fn vendor_core_src_dir(&self) -> PathBuf {
        self.vendor_core_src_dir
            .clone()
            .unwrap_or_else(|| self.sam_dir().join("cores").join("arduino"))
    }

    pub fn uploader(&self) -> PathBuf {
        self.uploader
            .clone()
            .unwrap_or_else(|| self.vendor_sdk_dir.join("hardware").join("tools").join("bossac"))
    }

    pub fn linker_script(&self) -> PathBuf {
        self.linker_script.clone().unwrap_or_else(|| {
            self.target_variant_dir()
                .join("linker_scripts")
                .join("gcc")
                .join("flash.ld")
        })
    }

    pub fn vendor_archive(&self) -> PathBuf {
        self.vendor_archive
            .clone()
            .unwrap_or_else(|| self.target_variant_dir().join("libsam_sam3x8e_gcc_rel.a"))
    }

    /// Include directories in command-line order.
    pub fn include_paths(&self) -> Vec<PathBuf> {
        if let Some(ref paths) = self.include_paths {
            return paths.clone();
        }
        let sam = self.sam_dir();
        vec![
            sam.join("system").join("libsam"),
            sam.join("system/CMSIS/CMSIS/Include/"),
            sam.join("system/CMSIS/Device/ATMEL/"),
            sam.join("cores").join("arduino"),
            self.target_variant_dir(),
            PathBuf::from("mruby_src/include"),
        ]
    }

    /// Base name for the linked image, map and binary.
    ///
    /// Taken from the staged name of the first user file, so `src/app.cpp`
    /// gives `app.cpp.elf` inside the build directory.
    pub fn image_stem(&self) -> &str {
        self.user_files
            .first()
            .map(|file| base_name(file))
            .unwrap_or("firmware")
    }

    pub fn elf_path(&self) -> PathBuf {
        self.build_dir.join(format!("{}.elf", self.image_stem()))
    }

    pub fn map_path(&self) -> PathBuf {
        self.build_dir.join(format!("{}.map", self.image_stem()))
    }

    pub fn bin_path(&self) -> PathBuf {
        self.build_dir.join(format!("{}.bin", self.image_stem()))
    }

    pub fn core_archive_path(&self) -> PathBuf {
        self.build_dir.join(&self.core_archive)
    }

    /// Device node opened for the reset pulse.
    pub fn serial_device_path(&self) -> String {
        if self.serial_port.contains('/') || self.serial_port.contains('\\') || cfg!(windows) {
            self.serial_port.clone()
        } else {
            format!("/dev/{}", self.serial_port)
        }
    }

    pub fn upload_timeout(&self) -> Option<Duration> {
        (self.upload_timeout_secs > 0).then(|| Duration::from_secs(self.upload_timeout_secs))
    }

    /// Split a flag group on whitespace.
    pub fn flag_words(group: &str) -> impl Iterator<Item = &str> {
        group.split_whitespace()
    }

    /// Units compiled from the staged user sources.
    ///
    /// User files are copied flat into `build_dir`, so each unit is named
    /// after the staged copy rather than the project-relative path.
    pub fn user_units(&self) -> Vec<CompilationUnit> {
        let staged: Vec<String> = self
            .user_files
            .iter()
            .map(|file| base_name(file).to_string())
            .collect();
        units_for(&staged, &self.build_dir, SourceOrigin::Workspace, Language::Cxx)
    }

    /// Units compiled from the vendor C sources.
    pub fn c_units(&self) -> Vec<CompilationUnit> {
        units_for(
            &self.c_files,
            &self.vendor_core_src_dir(),
            SourceOrigin::VendorCore,
            Language::C,
        )
    }

    /// Units compiled from the vendor C++ sources.
    pub fn cpp_units(&self) -> Vec<CompilationUnit> {
        units_for(
            &self.cpp_files,
            &self.vendor_core_src_dir(),
            SourceOrigin::VendorCore,
            Language::Cxx,
        )
    }

    /// Units compiled from the board variant.
    pub fn variant_units(&self) -> Vec<CompilationUnit> {
        units_for(
            &self.variant_files,
            &self.target_variant_dir(),
            SourceOrigin::Variant,
            Language::Cxx,
        )
    }
}

/// A partial configuration as read from one file; only set keys override.
#[derive(Debug, Clone, Default)]
struct ConfigLayer(toml::Table);

impl ConfigLayer {
    fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let table: toml::Table = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;
        Ok(ConfigLayer(table))
    }

    fn merge(&mut self, other: ConfigLayer) {
        for (key, value) in other.0 {
            self.0.insert(key, value);
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (`Dueflash.toml` or an explicit path)
/// 2. Global config (`~/.dueflash/config.toml`)
/// 3. Defaults
///
/// An explicitly requested project file must exist and parse; an implicit
/// one is skipped with a warning when broken.
pub fn load_config(global_path: Option<&Path>, project_path: &Path, explicit: bool) -> Result<BuildConfig> {
    let mut merged = ConfigLayer::default();

    if let Some(global) = global_path.filter(|p| p.exists()) {
        match ConfigLayer::load(global) {
            Ok(layer) => merged.merge(layer),
            Err(e) => tracing::warn!("ignoring global config: {:#}", e),
        }
    }

    if explicit || project_path.exists() {
        match ConfigLayer::load(project_path) {
            Ok(layer) => merged.merge(layer),
            Err(e) if explicit => return Err(e),
            Err(e) => tracing::warn!("ignoring project config: {:#}", e),
        }
    }

    toml::Value::Table(merged.0)
        .try_into::<BuildConfig>()
        .context("invalid configuration")
}
