//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use dueflash::core::{ArchiveMode, BuildConfig, CompileMode};
use dueflash::util::shell::ColorChoice;

/// dueflash - build and flash firmware for Cortex-M3 boards
#[derive(Parser)]
#[command(name = "dueflash")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (full command lines, debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors and tool output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Project configuration file (defaults to ./Dueflash.toml)
    #[arg(long, global = true, env = "DUEFLASH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile, link and pack the firmware, then program the board
    Build(BuildArgs),

    /// Program an already built binary
    Flash(FlashArgs),

    /// Remove the build directory
    Clean(CleanArgs),

    /// Check the toolchain, SDK layout, inputs and serial device
    Doctor(DoctorArgs),

    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    #[default]
    Human,
    Json,
}

/// Flags that override values from the configuration files.
#[derive(Args, Debug, Default)]
pub struct ConfigOverrides {
    /// Serial port the board is attached to
    #[arg(long)]
    pub port: Option<String>,

    /// Directory for staged inputs and build outputs
    #[arg(long)]
    pub build_dir: Option<PathBuf>,

    /// Stop after packing the image
    #[arg(long)]
    pub no_flash: bool,

    /// Abort on the first compiler failure
    #[arg(long)]
    pub strict: bool,

    /// Add each object to the core archive as soon as it is compiled
    #[arg(long)]
    pub incremental_archive: bool,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut BuildConfig) {
        if let Some(port) = &self.port {
            config.serial_port = port.clone();
        }
        if let Some(dir) = &self.build_dir {
            config.build_dir = dir.clone();
        }
        if self.no_flash {
            config.flash_after_build = false;
        }
        if self.strict {
            config.compile_mode = CompileMode::Strict;
        }
        if self.incremental_archive {
            config.archive_mode = ArchiveMode::Incremental;
        }
    }
}

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Print the commands the build would run as JSON (no build)
    #[arg(long)]
    pub plan: bool,

    /// Output format for pipeline events
    #[arg(long, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,
}

#[derive(Args)]
pub struct FlashArgs {
    /// Binary to upload (defaults to the image `build` produces)
    pub bin: Option<PathBuf>,

    /// Serial port the board is attached to
    #[arg(long)]
    pub port: Option<String>,

    /// Directory the default binary is looked up in
    #[arg(long)]
    pub build_dir: Option<PathBuf>,

    /// Output format for pipeline events
    #[arg(long, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Directory to remove (defaults to the configured build directory)
    #[arg(long)]
    pub build_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct DoctorArgs {
    /// Serial port to look for
    #[arg(long)]
    pub port: Option<String>,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub overrides: ConfigOverrides,
}
