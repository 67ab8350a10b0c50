//! Artifacts passed between pipeline stages.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Objects produced so far plus the archive they are collected into.
///
/// Created empty by the workspace preparer and only ever grown by the
/// compile stages; the linker consumes it whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildArtifactSet {
    build_dir: PathBuf,
    /// Staged user library
    user_library: PathBuf,
    /// Core archive path (written only by the archiver)
    archive: PathBuf,
    objects: Vec<PathBuf>,
}

impl BuildArtifactSet {
    /// Create an empty set rooted at `build_dir`.
    pub fn new(build_dir: impl Into<PathBuf>, user_library: impl Into<PathBuf>, archive: impl Into<PathBuf>) -> Self {
        BuildArtifactSet {
            build_dir: build_dir.into(),
            user_library: user_library.into(),
            archive: archive.into(),
            objects: Vec::new(),
        }
    }

    /// Record a produced object. Re-recording the same path is a no-op.
    pub fn push_object(&mut self, object: PathBuf) {
        if !self.objects.contains(&object) {
            self.objects.push(object);
        }
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn user_library(&self) -> &Path {
        &self.user_library
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// Objects in the order they were produced.
    pub fn objects(&self) -> &[PathBuf] {
        &self.objects
    }
}

/// The linked executable image and its link map.
///
/// Not `Clone`: the packer takes it by value, exactly once.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct LinkedImage {
    pub elf: PathBuf,
    pub map: PathBuf,
}

/// Raw binary produced by the packer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawImage {
    pub bin: PathBuf,
    /// The image it was packed from
    pub elf: PathBuf,
    pub map: PathBuf,
}

/// What the uploader transcript says about one flash attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum FlashResult {
    /// The uploader confirmed writing this many bytes.
    Confirmed { bytes_written: u64 },
    /// No confirmation line was found.
    Unconfirmed,
}

impl FlashResult {
    pub fn bytes_written(&self) -> Option<u64> {
        match self {
            FlashResult::Confirmed { bytes_written } => Some(*bytes_written),
            FlashResult::Unconfirmed => None,
        }
    }
}
