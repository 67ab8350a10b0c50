//! Build directory preparation.
//!
//! The preparer is the only component allowed to delete or create the build
//! directory. Every run starts from an empty directory holding just the
//! staged user sources and the prebuilt user library.

use std::io;
use std::path::Path;

use crate::core::artifacts::BuildArtifactSet;
use crate::core::config::BuildConfig;
use crate::core::errors::PipelineError;
use crate::core::unit::base_name;
use crate::util::fs::{copy_file, ensure_dir, normalize_path, remove_dir_all_if_exists};

/// Wipe and recreate the build directory, then stage the user inputs.
///
/// Inputs are read relative to `source_root` (the project directory).
pub fn prepare(config: &BuildConfig, source_root: &Path) -> Result<BuildArtifactSet, PipelineError> {
    let build_dir = &config.build_dir;
    check_build_dir(build_dir, source_root)?;

    tracing::debug!("recreating {}", build_dir.display());
    remove_dir_all_if_exists(build_dir)?;
    ensure_dir(build_dir)?;

    for file in &config.user_files {
        copy_file(&source_root.join(file), &build_dir.join(base_name(file)))?;
    }

    let artifacts = staged_artifacts(config);
    copy_file(&source_root.join(&config.user_library), artifacts.user_library())?;

    Ok(artifacts)
}

/// The build directory must not be the project directory or one of its parents.
pub fn check_build_dir(build_dir: &Path, source_root: &Path) -> Result<(), PipelineError> {
    if normalize_path(source_root).starts_with(normalize_path(build_dir)) {
        return Err(PipelineError::fs(
            "remove directory",
            build_dir,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "build directory contains the project sources",
            ),
        ));
    }
    Ok(())
}

/// The empty artifact set [`prepare`] hands out, computed without touching disk.
pub fn staged_artifacts(config: &BuildConfig) -> BuildArtifactSet {
    BuildArtifactSet::new(
        config.build_dir.clone(),
        config.build_dir.join(base_name(&config.user_library)),
        config.core_archive_path(),
    )
}
