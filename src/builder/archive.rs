//! Core archive management.
//!
//! The [`Archiver`] is the only writer of the core archive. Membership is
//! keyed by object file name: adding an object with a name already present
//! replaces the old member, matching `ar r` semantics.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::builder::context::BuildContext;
use crate::builder::events::PipelineEvent;
use crate::core::config::ArchiveMode;
use crate::core::errors::PipelineError;

/// Collects compiled objects into the core archive.
#[derive(Debug)]
pub struct Archiver {
    archive: PathBuf,
    mode: ArchiveMode,
    /// Member name -> object path
    members: BTreeMap<String, PathBuf>,
    /// Whether the archive on disk reflects `members`
    written: bool,
}

impl Archiver {
    pub fn new(archive: impl Into<PathBuf>, mode: ArchiveMode) -> Self {
        Archiver {
            archive: archive.into(),
            mode,
            members: BTreeMap::new(),
            written: false,
        }
    }

    /// Register an object right after it was compiled.
    ///
    /// In incremental mode this runs `ar` immediately; in batched mode the
    /// object is only recorded until [`Archiver::finalize`].
    pub fn append(&mut self, ctx: &BuildContext<'_>, object: &Path) -> Result<(), PipelineError> {
        let name = member_name(object);
        if let Some(previous) = self.members.insert(name.clone(), object.to_path_buf()) {
            if previous != object {
                tracing::debug!("archive member `{}` replaced by {}", name, object.display());
            }
        }

        match self.mode {
            ArchiveMode::Incremental => self.run_ar(ctx, &[object.to_path_buf()]),
            ArchiveMode::Batched => {
                self.written = false;
                Ok(())
            }
        }
    }

    /// Make sure the archive on disk holds every registered member.
    ///
    /// Batched mode writes the archive here with one `ar` call. Returns the
    /// archive path.
    pub fn finalize(&mut self, ctx: &BuildContext<'_>) -> Result<&Path, PipelineError> {
        if self.is_empty() {
            ctx.shell.warn(format!(
                "no objects to archive; `{}` was not created",
                self.archive.display()
            ));
            return Ok(&self.archive);
        }

        if self.mode == ArchiveMode::Batched && !self.written {
            let objects: Vec<PathBuf> = self.members.values().cloned().collect();
            self.run_ar(ctx, &objects)?;
        }

        ctx.emit(PipelineEvent::ArchiveUpdated {
            archive: self.archive.clone(),
            members: self.members.len(),
        });
        Ok(&self.archive)
    }

    fn run_ar(&mut self, ctx: &BuildContext<'_>, objects: &[PathBuf]) -> Result<(), PipelineError> {
        let spec = ctx.toolchain.archive_command(&self.archive, objects);
        let output = ctx.run(&spec)?;
        ctx.shell.tool_output(&spec.program_name(), &output.combined());

        if !output.succeeded() {
            return Err(PipelineError::Archive {
                archive: self.archive.clone(),
                output: output.combined(),
            });
        }

        self.written = true;
        Ok(())
    }

    /// Member names in archive order.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.archive
    }
}

fn member_name(object: &Path) -> String {
    object
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| object.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::BuildConfig;
    use crate::test_support::{archive_members, FakeToolchain};
    use crate::util::shell::Shell;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn objects(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|n| {
                let p = dir.join(n);
                fs::write(&p, n).unwrap();
                p
            })
            .collect()
    }

    #[test]
    fn test_batched_runs_ar_once() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig::default();
        let fake = FakeToolchain::new();
        let ctx = BuildContext::new(&config, &fake, Arc::new(Shell::quiet())).with_toolchain(fake.toolchain());

        let archive = tmp.path().join("core.a");
        let mut archiver = Archiver::new(&archive, ArchiveMode::Batched);
        for obj in objects(tmp.path(), &["a.c.o", "b.cpp.o"]) {
            archiver.append(&ctx, &obj).unwrap();
        }
        assert!(fake.calls().is_empty());

        archiver.finalize(&ctx).unwrap();
        assert_eq!(fake.calls_to("ar").len(), 1);
        assert_eq!(archive_members(&archive), vec!["a.c.o", "b.cpp.o"]);
    }

    #[test]
    fn test_incremental_runs_ar_per_object() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig::default();
        let fake = FakeToolchain::new();
        let ctx = BuildContext::new(&config, &fake, Arc::new(Shell::quiet())).with_toolchain(fake.toolchain());

        let archive = tmp.path().join("core.a");
        let mut archiver = Archiver::new(&archive, ArchiveMode::Incremental);
        for obj in objects(tmp.path(), &["a.c.o", "b.cpp.o", "c.cpp.o"]) {
            archiver.append(&ctx, &obj).unwrap();
        }
        archiver.finalize(&ctx).unwrap();

        assert_eq!(fake.calls_to("ar").len(), 3);
        assert_eq!(archive_members(&archive), vec!["a.c.o", "b.cpp.o", "c.cpp.o"]);
    }

    #[test]
    fn test_same_name_replaces_member() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("other")).unwrap();
        let config = BuildConfig::default();
        let fake = FakeToolchain::new();
        let ctx = BuildContext::new(&config, &fake, Arc::new(Shell::quiet())).with_toolchain(fake.toolchain());

        let first = objects(tmp.path(), &["CDC.cpp.o"]);
        let second = objects(&tmp.path().join("other"), &["CDC.cpp.o"]);

        for mode in [ArchiveMode::Batched, ArchiveMode::Incremental] {
            let archive = tmp.path().join(format!("{:?}.a", mode));
            let mut archiver = Archiver::new(&archive, mode);
            archiver.append(&ctx, &first[0]).unwrap();
            archiver.append(&ctx, &second[0]).unwrap();
            archiver.finalize(&ctx).unwrap();

            assert_eq!(archiver.len(), 1);
            assert_eq!(archive_members(&archive), vec!["CDC.cpp.o"]);
        }
    }

    #[test]
    fn test_ar_failure_is_archive_error() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig::default();
        let fake = FakeToolchain::new().fail_on("rcs", 1, "ar: core.a: Permission denied");
        let ctx = BuildContext::new(&config, &fake, Arc::new(Shell::quiet())).with_toolchain(fake.toolchain());

        let mut archiver = Archiver::new(tmp.path().join("core.a"), ArchiveMode::Batched);
        archiver.append(&ctx, &objects(tmp.path(), &["a.c.o"])[0]).unwrap();

        let err = archiver.finalize(&ctx).unwrap_err();
        assert!(matches!(err, PipelineError::Archive { ref output, .. } if output.contains("Permission denied")));
    }

    #[test]
    fn test_empty_archive_is_skipped() {
        let config = BuildConfig::default();
        let fake = FakeToolchain::new();
        let ctx = BuildContext::new(&config, &fake, Arc::new(Shell::quiet())).with_toolchain(fake.toolchain());

        let mut archiver = Archiver::new("/nowhere/core.a", ArchiveMode::Batched);
        assert!(archiver.is_empty());
        archiver.finalize(&ctx).unwrap();
        assert!(fake.calls().is_empty());
    }
}
