//! Command implementations

pub mod build;
pub mod clean;
pub mod config;
pub mod doctor;
pub mod flash;

use std::path::PathBuf;

use anyhow::Result;

use crate::cli::Cli;
use dueflash::core::config::load_config;
use dueflash::core::BuildConfig;
use dueflash::util::shell::{ColorChoice, Shell};
use dueflash::util::GlobalContext;

/// Flags shared by every subcommand.
pub struct GlobalArgs {
    pub verbose: bool,
    pub quiet: bool,
    pub color: ColorChoice,
    pub config: Option<PathBuf>,
}

impl From<&Cli> for GlobalArgs {
    fn from(cli: &Cli) -> Self {
        GlobalArgs {
            verbose: cli.verbose,
            quiet: cli.quiet,
            color: cli.color,
            config: cli.config.clone(),
        }
    }
}

impl GlobalArgs {
    pub fn shell(&self, json: bool) -> Shell {
        Shell::from_flags(self.quiet, self.verbose, self.color, json)
    }
}

/// Load global and project configuration, let `adjust` apply CLI
/// overrides, then anchor relative paths at the working directory.
pub fn load_build_config(
    gctx: &GlobalContext,
    global: &GlobalArgs,
    adjust: impl FnOnce(&mut BuildConfig),
) -> Result<BuildConfig> {
    let (project, explicit) = match &global.config {
        Some(path) => (gctx.resolve(path), true),
        None => (gctx.project_config_path(), false),
    };

    let mut config = load_config(Some(&gctx.config_path()), &project, explicit)?;
    adjust(&mut config);
    tracing::debug!("effective build dir: {}", config.build_dir.display());
    Ok(config.rooted_at(gctx.cwd()))
}
