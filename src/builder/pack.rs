//! Raw binary packing.

use crate::builder::context::BuildContext;
use crate::builder::events::{PipelineEvent, Stage};
use crate::core::artifacts::{LinkedImage, RawImage};
use crate::core::errors::PipelineError;
use crate::util::shell::Status;

/// Strip the linked image down to the bytes the bootloader writes.
pub fn pack(ctx: &BuildContext<'_>, image: LinkedImage) -> Result<RawImage, PipelineError> {
    let bin = ctx.config.bin_path();

    ctx.shell.status(Status::Packing, bin.display());
    ctx.emit(PipelineEvent::stage(Stage::Pack));

    let spec = ctx.toolchain.objcopy_command(&image.elf, &bin);
    let output = ctx.run(&spec)?;
    ctx.shell.tool_output(&spec.program_name(), &output.combined());

    if !output.succeeded() || !bin.is_file() {
        return Err(PipelineError::Pack {
            image: image.elf,
            output: output.combined(),
        });
    }

    ctx.emit(PipelineEvent::ImagePacked { bin: bin.clone() });
    Ok(RawImage {
        bin,
        elf: image.elf,
        map: image.map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeToolchain, SdkFixture};
    use crate::util::shell::Shell;
    use std::fs;
    use std::sync::Arc;

    fn linked(sdk: &SdkFixture) -> LinkedImage {
        let config = sdk.config();
        fs::write(config.elf_path(), b"\x7fELF").unwrap();
        fs::write(config.map_path(), "map").unwrap();
        LinkedImage {
            elf: config.elf_path(),
            map: config.map_path(),
        }
    }

    #[test]
    fn test_pack_writes_bin() {
        let sdk = SdkFixture::new();
        let config = sdk.config();
        let fake = FakeToolchain::new();
        let ctx = BuildContext::new(&config, &fake, Arc::new(Shell::quiet())).with_toolchain(fake.toolchain());

        let raw = pack(&ctx, linked(&sdk)).unwrap();
        assert_eq!(raw.bin, config.build_dir.join("mruby.cpp.bin"));
        assert!(raw.bin.is_file());
        assert_eq!(fake.calls_to("objcopy").len(), 1);
    }

    #[test]
    fn test_objcopy_failure_is_pack_error() {
        let sdk = SdkFixture::new();
        let config = sdk.config();
        let fake = FakeToolchain::new().fail_on("-O binary", 1, "objcopy: file format not recognized");
        let ctx = BuildContext::new(&config, &fake, Arc::new(Shell::quiet())).with_toolchain(fake.toolchain());

        let err = pack(&ctx, linked(&sdk)).unwrap_err();
        assert!(matches!(err, PipelineError::Pack { ref output, .. } if output.contains("not recognized")));
    }
}
