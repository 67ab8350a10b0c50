//! Compiler invocation.
//!
//! [`Compiler`] runs one compiler process per [`CompilationUnit`], in list
//! order, and hands each produced object straight to the [`Archiver`].

use crate::builder::archive::Archiver;
use crate::builder::context::BuildContext;
use crate::builder::events::{PipelineEvent, Stage};
use crate::core::artifacts::BuildArtifactSet;
use crate::core::config::CompileMode;
use crate::core::errors::{CompileDiagnostic, PipelineError};
use crate::core::unit::CompilationUnit;
use crate::util::shell::{Progress, Status};

/// Runs the compile stages and collects their diagnostics.
pub struct Compiler<'c, 'a> {
    ctx: &'c BuildContext<'a>,
    progress: Progress,
    diagnostics: Vec<CompileDiagnostic>,
}

impl<'c, 'a> Compiler<'c, 'a> {
    /// `total` is the number of units across all compile stages.
    pub fn new(ctx: &'c BuildContext<'a>, total: usize) -> Self {
        Compiler {
            ctx,
            progress: ctx.shell.progress(total as u64, "Compiling"),
            diagnostics: Vec::new(),
        }
    }

    /// Compile every unit of one stage.
    pub fn compile_stage(
        &mut self,
        stage: Stage,
        label: &str,
        units: &[CompilationUnit],
        artifacts: &mut BuildArtifactSet,
        archiver: &mut Archiver,
    ) -> Result<(), PipelineError> {
        if units.is_empty() {
            return Ok(());
        }

        self.progress
            .suspend(|| self.ctx.shell.status(Status::Compiling, format!("{} ({})", label, units.len())));
        self.ctx.emit(PipelineEvent::stage(stage));
        tracing::info!("compiling {} {}", units.len(), label);

        for unit in units {
            self.compile_unit(unit, artifacts, archiver)?;
        }
        Ok(())
    }

    fn compile_unit(
        &mut self,
        unit: &CompilationUnit,
        artifacts: &mut BuildArtifactSet,
        archiver: &mut Archiver,
    ) -> Result<(), PipelineError> {
        let object = unit.object_path(artifacts.build_dir());
        let spec = self.ctx.toolchain.compile_command(self.ctx.config, unit, &object);
        let output = self.ctx.run(&spec)?;
        self.progress.inc(1);

        if output.has_output() {
            let text = output.combined();
            self.progress
                .suspend(|| self.ctx.shell.tool_output(&spec.program_name(), &text));
        }

        if !output.succeeded() && self.ctx.config.compile_mode == CompileMode::Strict {
            return Err(PipelineError::Compile {
                source_file: unit.source.clone(),
                status: output.status,
                output: output.combined(),
            });
        }

        if output.has_output() || !output.succeeded() {
            let diag = CompileDiagnostic {
                source: unit.source.clone(),
                status: output.status,
                output: output.combined(),
            };
            self.ctx.emit(PipelineEvent::diagnostic(&diag));
            self.diagnostics.push(diag);
        }

        if !output.succeeded() {
            self.progress.suspend(|| {
                self.ctx.shell.warn(format!(
                    "`{}` failed to compile; `{}` left out of the archive",
                    unit.name, unit.object_name
                ))
            });
            return Ok(());
        }

        self.ctx.emit(PipelineEvent::artifact(&unit.source, &object));
        artifacts.push_object(object.clone());
        archiver.append(self.ctx, &object)
    }

    /// Clear the progress bar and return the collected diagnostics.
    pub fn finish(self) -> Vec<CompileDiagnostic> {
        self.progress.finish();
        self.diagnostics
    }
}
