//! Global context for dueflash operations.
//!
//! Resolves the working directory, the user-wide config location and the
//! project config file.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};

use crate::core::config::CONFIG_FILE_NAME;

static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("com", "dueflash", "dueflash"));

/// Paths shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for user-wide data (~/.dueflash/)
    home: PathBuf,
}

impl GlobalContext {
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(GlobalContext {
            cwd,
            home: default_home(),
        })
    }

    /// Create a context rooted at a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let mut ctx = Self::new()?;
        ctx.cwd = cwd;
        Ok(ctx)
    }

    /// Override the home directory (`DUEFLASH_HOME`).
    pub fn with_home(mut self, home: PathBuf) -> Self {
        self.home = home;
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// User-wide configuration file.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Project configuration file in the working directory.
    pub fn project_config_path(&self) -> PathBuf {
        self.cwd.join(CONFIG_FILE_NAME)
    }

    /// Resolve a command-line path against the working directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}

fn default_home() -> PathBuf {
    if let Some(home) = std::env::var_os("DUEFLASH_HOME") {
        return PathBuf::from(home);
    }
    if let Some(dirs) = BaseDirs::new() {
        return dirs.home_dir().join(".dueflash");
    }
    PROJECT_DIRS
        .as_ref()
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".dueflash"))
}
