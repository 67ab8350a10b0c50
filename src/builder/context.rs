//! Build context - configuration, toolchain and output shared by every stage.

use std::fmt;
use std::sync::Arc;

use crate::builder::events::PipelineEvent;
use crate::builder::toolchain::{ArmToolchain, CommandSpec};
use crate::core::config::BuildConfig;
use crate::core::errors::PipelineError;
use crate::util::process::{ToolOutput, ToolRunner};
use crate::util::shell::Shell;

/// Everything a stage needs besides its own inputs.
#[derive(Clone)]
pub struct BuildContext<'a> {
    pub config: &'a BuildConfig,

    /// Resolved tool paths
    pub toolchain: ArmToolchain,

    /// How commands are executed
    pub runner: &'a dyn ToolRunner,

    pub shell: Arc<Shell>,
}

impl fmt::Debug for BuildContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("build_dir", &self.config.build_dir)
            .field("toolchain", &self.toolchain)
            .finish_non_exhaustive()
    }
}

impl<'a> BuildContext<'a> {
    /// Create a context, resolving the toolchain from `config`.
    pub fn new(config: &'a BuildConfig, runner: &'a dyn ToolRunner, shell: Arc<Shell>) -> Self {
        BuildContext {
            config,
            toolchain: ArmToolchain::from_config(config),
            runner,
            shell,
        }
    }

    /// Use an explicit toolchain instead of the configured one.
    pub fn with_toolchain(mut self, toolchain: ArmToolchain) -> Self {
        self.toolchain = toolchain;
        self
    }

    /// Run a command, echoing it in verbose mode.
    pub fn run(&self, spec: &CommandSpec) -> Result<ToolOutput, PipelineError> {
        self.shell.command(spec.display());
        self.runner.run(spec)
    }

    pub fn emit(&self, event: PipelineEvent) {
        self.shell.event(&event);
    }
}
