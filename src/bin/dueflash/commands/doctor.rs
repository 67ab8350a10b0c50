//! `dueflash doctor` command

use anyhow::Result;

use super::{load_build_config, GlobalArgs};
use crate::cli::DoctorArgs;
use dueflash::ops::{doctor, format_report, DoctorOptions};
use dueflash::util::GlobalContext;

pub fn execute(args: DoctorArgs, global: &GlobalArgs) -> Result<()> {
    let gctx = GlobalContext::new()?;
    let config = load_build_config(&gctx, global, |c| {
        if let Some(port) = &args.port {
            c.serial_port = port.clone();
        }
    })?;

    let options = DoctorOptions {
        verbose: global.verbose,
    };
    let report = doctor(&config, gctx.cwd(), &options);

    print!("{}", format_report(&report, global.verbose));

    // Exit with error code if required checks failed
    if !report.all_required_passed() {
        std::process::exit(1);
    }

    Ok(())
}
