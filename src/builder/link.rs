//! Final link.

use std::path::PathBuf;

use crate::builder::context::BuildContext;
use crate::builder::events::{PipelineEvent, Stage};
use crate::builder::toolchain::LinkInput;
use crate::core::artifacts::{BuildArtifactSet, LinkedImage};
use crate::core::config::BuildConfig;
use crate::core::errors::PipelineError;
use crate::util::shell::Status;

/// Inputs placed inside the start/end group, in link order: user library,
/// syscall shim object, user objects, vendor archive, core archive.
pub fn link_group(config: &BuildConfig, artifacts: &BuildArtifactSet) -> Vec<PathBuf> {
    let build_dir = artifacts.build_dir();

    let mut group = vec![artifacts.user_library().to_path_buf()];
    group.push(build_dir.join(&config.syscalls_object));
    group.extend(config.user_units().iter().map(|u| u.object_path(build_dir)));
    group.push(config.vendor_archive());
    group.push(artifacts.archive().to_path_buf());
    group
}

/// Everything the link command needs.
pub fn link_input(config: &BuildConfig, artifacts: &BuildArtifactSet) -> LinkInput {
    LinkInput {
        output: config.elf_path(),
        map: config.map_path(),
        linker_script: config.linker_script(),
        cpu: config.cpu.clone(),
        entry_symbol: config.entry_symbol.clone(),
        lib_dir: artifacts.build_dir().to_path_buf(),
        group: link_group(config, artifacts),
    }
}

/// Link everything produced so far into the firmware image.
///
/// Consumes the artifact set. A non-zero linker exit, which includes any
/// unresolved symbol, or a missing image afterwards is a [`PipelineError::Link`].
pub fn link(ctx: &BuildContext<'_>, artifacts: BuildArtifactSet) -> Result<LinkedImage, PipelineError> {
    let input = link_input(ctx.config, &artifacts);
    let elf = input.output.clone();
    let map = input.map.clone();

    ctx.shell.status(Status::Linking, elf.display());
    ctx.emit(PipelineEvent::stage(Stage::Link));

    let spec = ctx.toolchain.link_command(&input);
    let output = ctx.run(&spec)?;
    ctx.shell.tool_output(&spec.program_name(), &output.combined());

    if !output.succeeded() {
        return Err(PipelineError::Link {
            image: elf,
            output: output.combined(),
        });
    }
    if !elf.is_file() {
        return Err(PipelineError::Link {
            output: format!("linker exited successfully but `{}` was not written", elf.display()),
            image: elf,
        });
    }

    ctx.emit(PipelineEvent::ImageLinked {
        elf: elf.clone(),
        map: map.clone(),
    });
    Ok(LinkedImage { elf, map })
}
