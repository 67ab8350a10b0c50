//! Compilation units and the languages they are compiled as.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Which compiler driver a unit goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    #[serde(alias = "cpp", alias = "c++")]
    Cxx,
}

/// Where a source list is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceOrigin {
    /// Staged copy in the build directory
    Workspace,
    /// Vendor core source tree
    VendorCore,
    /// Board variant directory
    Variant,
}

/// A source file and the object it compiles to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationUnit {
    /// Source path as listed in the configuration (may contain subdirectories)
    pub name: String,
    /// Resolved path the compiler reads
    pub source: PathBuf,
    /// Flattened object file name inside the build directory
    pub object_name: String,
    pub language: Language,
    pub origin: SourceOrigin,
}

impl CompilationUnit {
    /// Create a unit for `name` found under `origin_dir`.
    pub fn new(name: &str, origin_dir: &Path, origin: SourceOrigin, language: Language) -> Self {
        CompilationUnit {
            name: name.to_string(),
            source: origin_dir.join(name),
            object_name: object_name_for(name),
            language,
            origin,
        }
    }

    /// Object path inside `build_dir`.
    pub fn object_path(&self, build_dir: &Path) -> PathBuf {
        build_dir.join(&self.object_name)
    }
}

/// Object file name for a listed source: `<base name>.o`.
///
/// Directory components are dropped so every object lands directly in the
/// build directory (`USB/CDC.cpp` -> `CDC.cpp.o`).
pub fn object_name_for(source: &str) -> String {
    format!("{}.o", base_name(source))
}

/// Last path component of a listed file (`src/app.cpp` -> `app.cpp`).
///
/// Staged user files and objects both live flat in the build directory
/// under this name.
pub fn base_name(file: &str) -> &str {
    file.rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .unwrap_or(file)
}

/// Build units for a file list, dropping repeated entries.
pub fn units_for(
    files: &[String],
    origin_dir: &Path,
    origin: SourceOrigin,
    language: Language,
) -> Vec<CompilationUnit> {
    let mut units: Vec<CompilationUnit> = Vec::with_capacity(files.len());
    for file in files {
        if units.iter().any(|u| u.name == *file) {
            tracing::debug!("skipping repeated source entry `{}`", file);
            continue;
        }
        units.push(CompilationUnit::new(file, origin_dir, origin, language));
    }
    units
}
