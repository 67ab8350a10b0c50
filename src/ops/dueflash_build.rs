//! Implementation of `dueflash build`.
//!
//! Runs the whole pipeline in order: prepare, compile (user, C, C++,
//! variant), archive, link, pack, and program. Any fatal error stops the
//! run at the stage that produced it.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::builder::archive::Archiver;
use crate::builder::compile::Compiler;
use crate::builder::context::BuildContext;
use crate::builder::events::{PipelineEvent, Stage};
use crate::builder::link::{link, link_input};
use crate::builder::pack::pack;
use crate::builder::toolchain::{ArmToolchain, CommandSpec};
use crate::builder::workspace::{prepare, staged_artifacts};
use crate::core::artifacts::{BuildArtifactSet, FlashResult, RawImage};
use crate::core::config::{ArchiveMode, BuildConfig};
use crate::core::errors::{CompileDiagnostic, PipelineError};
use crate::core::unit::CompilationUnit;
use crate::flash::{uploader, DeviceProgrammer, SerialReset};
use crate::util::shell::Status;

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub image: RawImage,
    /// Compiler output and lenient-mode failures, in compile order
    pub diagnostics: Vec<CompileDiagnostic>,
    /// Members in the core archive
    pub archive_members: Vec<String>,
    /// Present when the board was programmed
    pub flash: Option<FlashResult>,
    pub duration: Duration,
}

impl BuildReport {
    /// Compiles that failed without stopping the run.
    pub fn compile_failures(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_failure()).count()
    }
}

/// The four compile stages, in pipeline order.
fn compile_stages(config: &BuildConfig) -> [(Stage, &'static str, Vec<CompilationUnit>); 4] {
    [
        (Stage::CompileUser, "user files", config.user_units()),
        (Stage::CompileC, "C files", config.c_units()),
        (Stage::CompileCxx, "C++ files", config.cpp_units()),
        (Stage::CompileVariant, "variant", config.variant_units()),
    ]
}

/// Run the pipeline.
///
/// User sources and the user library are read from `source_root`. The board
/// is programmed only when `flash_after_build` is set.
pub fn build(
    ctx: &BuildContext<'_>,
    serial: &dyn SerialReset,
    source_root: &Path,
) -> Result<BuildReport, PipelineError> {
    let start = Instant::now();
    let result = run_pipeline(ctx, serial, source_root, start);

    ctx.emit(PipelineEvent::BuildFinished {
        success: result.is_ok(),
        duration_ms: start.elapsed().as_millis() as u64,
        compile_failures: result.as_ref().map(BuildReport::compile_failures).unwrap_or(0),
        flashed: result.as_ref().is_ok_and(|r| r.flash.is_some()),
    });
    result
}

fn run_pipeline(
    ctx: &BuildContext<'_>,
    serial: &dyn SerialReset,
    source_root: &Path,
    start: Instant,
) -> Result<BuildReport, PipelineError> {
    let config = ctx.config;

    ctx.shell.status(Status::Preparing, config.build_dir.display());
    ctx.emit(PipelineEvent::stage(Stage::Prepare));
    let mut artifacts = prepare(config, source_root)?;

    let mut archiver = Archiver::new(artifacts.archive(), config.archive_mode);
    let stages = compile_stages(config);
    let total = stages.iter().map(|(_, _, units)| units.len()).sum();

    let mut compiler = Compiler::new(ctx, total);
    let compiled = stages.iter().try_for_each(|(stage, label, units)| {
        compiler.compile_stage(*stage, label, units, &mut artifacts, &mut archiver)
    });
    let diagnostics = compiler.finish();
    compiled?;

    let failed = diagnostics.iter().filter(|d| d.is_failure()).count();
    if failed > 0 {
        ctx.shell.warn(format!("{} source file(s) failed to compile", failed));
    }

    ctx.shell.status(
        Status::Archiving,
        format!("{} ({} objects)", archiver.path().display(), archiver.len()),
    );
    ctx.emit(PipelineEvent::stage(Stage::Archive));
    archiver.finalize(ctx)?;
    let archive_members = archiver.members().map(str::to_string).collect();

    let linked = link(ctx, artifacts)?;
    let image = pack(ctx, linked)?;

    let flash = if config.flash_after_build {
        let mut programmer = DeviceProgrammer::new(ctx, serial);
        Some(programmer.program(&image.bin)?)
    } else {
        ctx.shell
            .status(Status::Skipped, "programming (flash_after_build = false)");
        None
    };

    Ok(BuildReport {
        image,
        diagnostics,
        archive_members,
        flash,
        duration: start.elapsed(),
    })
}

/// One step of a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PlannedStep {
    /// Wipe `build_dir` and copy `inputs` into it
    Prepare { build_dir: PathBuf, inputs: Vec<PathBuf> },
    /// Run a tool
    Run { stage: Stage, command: CommandSpec },
    /// Open and close the serial port
    Reset { device: String, baud: u32 },
}

/// The steps [`build`] would take, without running anything.
///
/// Assumes every compile succeeds.
pub fn plan(config: &BuildConfig, toolchain: &ArmToolchain, source_root: &Path) -> Vec<PlannedStep> {
    let mut steps = Vec::new();
    let mut inputs: Vec<PathBuf> = config.user_files.iter().map(|f| source_root.join(f)).collect();
    inputs.push(source_root.join(&config.user_library));
    steps.push(PlannedStep::Prepare {
        build_dir: config.build_dir.clone(),
        inputs,
    });

    let mut artifacts: BuildArtifactSet = staged_artifacts(config);
    for (stage, _, units) in compile_stages(config) {
        for unit in &units {
            let object = unit.object_path(artifacts.build_dir());
            steps.push(PlannedStep::Run {
                stage,
                command: toolchain.compile_command(config, unit, &object),
            });
            if config.archive_mode == ArchiveMode::Incremental {
                steps.push(PlannedStep::Run {
                    stage: Stage::Archive,
                    command: toolchain.archive_command(artifacts.archive(), &[object.clone()]),
                });
            }
            artifacts.push_object(object);
        }
    }

    if config.archive_mode == ArchiveMode::Batched && !artifacts.objects().is_empty() {
        steps.push(PlannedStep::Run {
            stage: Stage::Archive,
            command: toolchain.archive_command(artifacts.archive(), &batched_members(artifacts.objects())),
        });
    }

    steps.push(PlannedStep::Run {
        stage: Stage::Link,
        command: toolchain.link_command(&link_input(config, &artifacts)),
    });
    steps.push(PlannedStep::Run {
        stage: Stage::Pack,
        command: toolchain.objcopy_command(&config.elf_path(), &config.bin_path()),
    });

    if config.flash_after_build {
        steps.push(PlannedStep::Reset {
            device: config.serial_device_path(),
            baud: config.reset_baud,
        });
        steps.push(PlannedStep::Run {
            stage: Stage::Program,
            command: uploader::upload_command(
                &config.uploader(),
                &config.serial_port,
                &config.bin_path(),
                config.upload_timeout(),
            ),
        });
    }

    steps
}

/// Objects as the batched archiver passes them: one per member name, by name.
fn batched_members(objects: &[PathBuf]) -> Vec<PathBuf> {
    let mut by_name = std::collections::BTreeMap::new();
    for obj in objects {
        by_name.insert(obj.file_name().map(|n| n.to_os_string()), obj.clone());
    }
    by_name.into_values().collect()
}
