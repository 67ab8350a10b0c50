//! On-disk fixtures: a miniature vendor SDK plus a project directory.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::config::BuildConfig;

/// A temporary tree laid out like the Arduino 1.5.2 SDK, next to a project
/// holding the user sources.
///
/// ```text
/// <root>/sdk/hardware/arduino/sam/cores/arduino/...    vendor C/C++ sources
/// <root>/sdk/hardware/arduino/sam/variants/arduino_due_x/...
/// <root>/sdk/hardware/tools/bossac
/// <root>/project/mruby.cpp, libmruby.a
/// <root>/project/build/
/// ```
pub struct SdkFixture {
    root: TempDir,
}

impl SdkFixture {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap_or_else(|e| panic!("failed to create temp dir: {}", e));
        let fixture = SdkFixture { root };

        let defaults = BuildConfig::default();
        let config = fixture.config();

        let core = config.vendor_core_src_dir();
        for file in defaults.c_files.iter().chain(&defaults.cpp_files) {
            write(&core.join(file), &format!("/* {} */\n", file));
        }

        let variant = config.target_variant_dir();
        for file in &defaults.variant_files {
            write(&variant.join(file), "/* variant */\n");
        }
        write(&config.linker_script(), "/* flash.ld */\n");
        write(&config.vendor_archive(), "!<arch>\n");
        write(&config.uploader(), "");

        let project = fixture.project_dir();
        write(&project.join("mruby.cpp"), "void setup() {}\nvoid loop() {}\n");
        write(&project.join("libmruby.a"), "!<arch>\n");
        fs::create_dir_all(&config.build_dir).unwrap_or_else(|e| panic!("failed to create build dir: {}", e));

        fixture
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn sdk_dir(&self) -> PathBuf {
        self.root().join("sdk")
    }

    /// Directory the user sources are staged from.
    pub fn project_dir(&self) -> PathBuf {
        self.root().join("project")
    }

    /// Default configuration pointed at this tree.
    pub fn config(&self) -> BuildConfig {
        BuildConfig {
            vendor_sdk_dir: self.sdk_dir(),
            build_dir: self.project_dir().join("build"),
            ..BuildConfig::default()
        }
    }
}

impl Default for SdkFixture {
    fn default() -> Self {
        SdkFixture::new()
    }
}

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap_or_else(|e| panic!("failed to create {}: {}", parent.display(), e));
    }
    fs::write(path, contents).unwrap_or_else(|e| panic!("failed to write {}: {}", path.display(), e));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_has_every_source() {
        let sdk = SdkFixture::new();
        let config = sdk.config();

        for unit in config
            .c_units()
            .iter()
            .chain(&config.cpp_units())
            .chain(&config.variant_units())
        {
            assert!(unit.source.is_file(), "missing {}", unit.source.display());
        }
        assert!(config.vendor_core_src_dir().join("USB/CDC.cpp").is_file());
        assert!(sdk.project_dir().join("mruby.cpp").is_file());
        assert!(config.build_dir.is_dir());
    }
}
