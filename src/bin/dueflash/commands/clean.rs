//! `dueflash clean` command

use anyhow::Result;

use super::{load_build_config, GlobalArgs};
use crate::cli::CleanArgs;
use dueflash::builder::workspace::check_build_dir;
use dueflash::util::fs::remove_dir_all_if_exists;
use dueflash::util::shell::Status;
use dueflash::util::GlobalContext;

pub fn execute(args: CleanArgs, global: &GlobalArgs) -> Result<()> {
    let gctx = GlobalContext::new()?;
    let config = load_build_config(&gctx, global, |c| {
        if let Some(dir) = &args.build_dir {
            c.build_dir = dir.clone();
        }
    })?;

    let shell = global.shell(false);
    if config.build_dir.exists() {
        check_build_dir(&config.build_dir, gctx.cwd())?;
        remove_dir_all_if_exists(&config.build_dir)?;
        shell.status(Status::Removed, config.build_dir.display());
    } else {
        shell.status(Status::Skipped, format!("{} does not exist", config.build_dir.display()));
    }
    Ok(())
}
