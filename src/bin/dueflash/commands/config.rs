//! `dueflash config` command

use anyhow::Result;

use super::{load_build_config, GlobalArgs};
use crate::cli::ConfigArgs;
use dueflash::util::GlobalContext;

pub fn execute(args: ConfigArgs, global: &GlobalArgs) -> Result<()> {
    let gctx = GlobalContext::new()?;
    let config = load_build_config(&gctx, global, |c| args.overrides.apply(c))?;
    print!("{}", config.to_toml()?);
    Ok(())
}
