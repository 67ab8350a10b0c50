//! `dueflash build` command

use std::sync::Arc;

use anyhow::Result;

use super::{load_build_config, GlobalArgs};
use crate::cli::{BuildArgs, MessageFormat};
use dueflash::builder::{ArmToolchain, BuildContext};
use dueflash::flash::SerialPortReset;
use dueflash::ops::{build, plan};
use dueflash::util::shell::Status;
use dueflash::util::{GlobalContext, SystemRunner};

pub fn execute(args: BuildArgs, global: &GlobalArgs) -> Result<()> {
    let gctx = GlobalContext::new()?;
    let config = load_build_config(&gctx, global, |c| args.overrides.apply(c))?;

    if args.plan {
        let toolchain = ArmToolchain::from_config(&config);
        let steps = plan(&config, &toolchain, gctx.cwd());
        println!("{}", serde_json::to_string_pretty(&steps)?);
        return Ok(());
    }

    let shell = Arc::new(global.shell(args.message_format == MessageFormat::Json));
    let runner = SystemRunner;
    let ctx = BuildContext::new(&config, &runner, Arc::clone(&shell));
    let span = shell.span();

    let report = match build(&ctx, &SerialPortReset, gctx.cwd()) {
        Ok(report) => report,
        Err(e) => {
            if e.image_was_built() {
                shell.note(format!("image left at {}", config.bin_path().display()));
            }
            return Err(e.into());
        }
    };

    let failures = report.compile_failures();
    let summary = if failures > 0 {
        format!("{} ({} compile failure(s))", report.image.bin.display(), failures)
    } else {
        report.image.bin.display().to_string()
    };
    span.finish(summary);

    if let Some(bytes) = report.flash.and_then(|f| f.bytes_written()) {
        shell.status(Status::Finished, format!("Flashed {} bytes to {}", bytes, config.serial_port));
    }
    Ok(())
}
