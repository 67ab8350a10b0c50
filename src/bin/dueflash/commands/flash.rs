//! `dueflash flash` command

use std::sync::Arc;

use anyhow::Result;

use super::{load_build_config, GlobalArgs};
use crate::cli::{FlashArgs, MessageFormat};
use dueflash::builder::BuildContext;
use dueflash::flash::{DeviceProgrammer, SerialPortReset};
use dueflash::util::shell::Status;
use dueflash::util::{GlobalContext, SystemRunner};

pub fn execute(args: FlashArgs, global: &GlobalArgs) -> Result<()> {
    let gctx = GlobalContext::new()?;
    let config = load_build_config(&gctx, global, |c| {
        if let Some(port) = &args.port {
            c.serial_port = port.clone();
        }
        if let Some(dir) = &args.build_dir {
            c.build_dir = dir.clone();
        }
    })?;

    let bin = match &args.bin {
        Some(path) => gctx.resolve(path),
        None => config.bin_path(),
    };

    let shell = Arc::new(global.shell(args.message_format == MessageFormat::Json));
    let runner = SystemRunner;
    let ctx = BuildContext::new(&config, &runner, Arc::clone(&shell));
    let span = shell.span();

    let mut programmer = DeviceProgrammer::new(&ctx, &SerialPortReset);
    let result = programmer.program(&bin)?;
    span.finish(bin.display());

    if let Some(bytes) = result.bytes_written() {
        shell.status(Status::Finished, format!("Flashed {} bytes to {}", bytes, config.serial_port));
    }
    Ok(())
}
