//! Filesystem utilities.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::errors::PipelineError;

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<(), PipelineError> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|e| PipelineError::fs("remove directory", path, e))?;
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<(), PipelineError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| PipelineError::fs("create directory", path, e))?;
    }
    Ok(())
}

/// Copy a single file, overwriting the destination.
pub fn copy_file(src: &Path, dst: &Path) -> Result<(), PipelineError> {
    if !src.is_file() {
        return Err(PipelineError::fs(
            "copy",
            src,
            std::io::Error::new(std::io::ErrorKind::NotFound, "source file not found"),
        ));
    }
    fs::copy(src, dst).map_err(|e| PipelineError::fs("copy", src, e))?;
    Ok(())
}

/// Sorted file names directly inside `dir`.
pub fn list_file_names(dir: &Path) -> Result<Vec<String>, PipelineError> {
    let entries = fs::read_dir(dir).map_err(|e| PipelineError::fs("read directory", dir, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::fs("read directory", dir, e))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Canonicalize a path, but don't fail if it doesn't exist yet.
///
/// A missing path is made absolute against the working directory instead.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remove_missing_dir_is_ok() {
        let tmp = TempDir::new().unwrap();
        remove_dir_all_if_exists(&tmp.path().join("nope")).unwrap();
    }

    #[test]
    fn test_copy_missing_file_is_filesystem_error() {
        let tmp = TempDir::new().unwrap();
        let err = copy_file(&tmp.path().join("missing.cpp"), &tmp.path().join("out.cpp")).unwrap_err();
        assert!(matches!(err, PipelineError::Filesystem { action: "copy", .. }));
    }

    #[test]
    fn test_normalize_path_resolves_parent_components() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a");
        fs::create_dir(&nested).unwrap();
        assert_eq!(normalize_path(&nested.join("..")), normalize_path(tmp.path()));
        assert!(normalize_path(Path::new("missing-dir")).is_absolute());
    }

    #[test]
    fn test_list_file_names_sorted() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.o"), "").unwrap();
        fs::write(tmp.path().join("a.o"), "").unwrap();
        assert_eq!(list_file_names(tmp.path()).unwrap(), vec!["a.o", "b.o"]);
    }
}
