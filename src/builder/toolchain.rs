//! Cross toolchain command generation.
//!
//! [`ArmToolchain`] knows the GNU ARM embedded command lines for each
//! pipeline step. It only builds [`CommandSpec`]s; running them is the
//! job of a [`ToolRunner`](crate::util::process::ToolRunner).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::core::config::BuildConfig;
use crate::core::unit::{CompilationUnit, Language};
use crate::util::process::find_executable;

/// A command to execute: program, arguments and an optional timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    /// The program to run
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
    /// Kill the process if it runs longer than this
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    /// Create a new command spec.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    /// Set a timeout.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether `arg` appears verbatim.
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// The argument following `flag`, e.g. the path after `-o`.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// File name of the program, without directories.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// Display the command the way a shell would show it.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Input for the final link.
#[derive(Debug, Clone)]
pub struct LinkInput {
    /// Linked image to produce
    pub output: PathBuf,
    /// Link map to produce
    pub map: PathBuf,
    pub linker_script: PathBuf,
    pub cpu: String,
    pub entry_symbol: String,
    /// Library search path (the build directory)
    pub lib_dir: PathBuf,
    /// Inputs placed between `--start-group` and `--end-group`, in order
    pub group: Vec<PathBuf>,
}

/// GNU ARM embedded toolchain (`arm-none-eabi-*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmToolchain {
    /// Path to the C compiler
    pub cc: PathBuf,
    /// Path to the C++ compiler (also the link driver)
    pub cxx: PathBuf,
    /// Path to the archiver
    pub ar: PathBuf,
    /// Path to objcopy
    pub objcopy: PathBuf,
}

impl ArmToolchain {
    /// Create a toolchain from explicit tool paths.
    pub fn new(cc: PathBuf, cxx: PathBuf, ar: PathBuf, objcopy: PathBuf) -> Self {
        ArmToolchain { cc, cxx, ar, objcopy }
    }

    /// Resolve tool paths from the configured bin directory and prefix.
    ///
    /// Without a bin directory the tools are looked up on PATH; a tool that
    /// cannot be found is left as its bare name so the failure surfaces as a
    /// tool invocation error when it is first run.
    pub fn from_config(config: &BuildConfig) -> Self {
        let tool = |name: &str| -> PathBuf {
            let exe = format!("{}{}", config.tool_prefix, name);
            match config.toolchain_bin_dir() {
                Some(dir) => dir.join(exe),
                None => find_executable(&exe).unwrap_or_else(|| PathBuf::from(exe)),
            }
        };
        ArmToolchain::new(tool("gcc"), tool("g++"), tool("ar"), tool("objcopy"))
    }

    /// Compiler driver for a language.
    pub fn compiler(&self, lang: Language) -> &Path {
        match lang {
            Language::C => &self.cc,
            Language::Cxx => &self.cxx,
        }
    }

    /// All tools, for health checks.
    pub fn tools(&self) -> [(&'static str, &Path); 4] {
        [
            ("C compiler", &self.cc),
            ("C++ compiler", &self.cxx),
            ("Archiver", &self.ar),
            ("objcopy", &self.objcopy),
        ]
    }

    /// Compile one unit into `output`.
    ///
    /// Flag order: generic flags, C++ flags (C++ only), target flags,
    /// include directories, source, output.
    pub fn compile_command(&self, config: &BuildConfig, unit: &CompilationUnit, output: &Path) -> CommandSpec {
        let mut cmd = CommandSpec::new(self.compiler(unit.language));

        cmd = cmd.args(BuildConfig::flag_words(&config.cflags));
        if unit.language == Language::Cxx {
            cmd = cmd.args(BuildConfig::flag_words(&config.cxxflags));
        }
        cmd = cmd.args(BuildConfig::flag_words(&config.target_flags));

        for dir in config.include_paths() {
            cmd = cmd.arg(format!("-I{}", dir.display()));
        }

        cmd = cmd.arg(unit.source.display().to_string());
        cmd = cmd.arg("-o");
        cmd = cmd.arg(output.display().to_string());

        cmd
    }

    /// Insert or replace `objects` in `archive`, creating it if needed.
    pub fn archive_command(&self, archive: &Path, objects: &[PathBuf]) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.ar);

        // Create archive with symbol index, replace files
        cmd = cmd.arg("rcs");
        cmd = cmd.arg(archive.display().to_string());

        for obj in objects {
            cmd = cmd.arg(obj.display().to_string());
        }

        cmd
    }

    /// Link the firmware image through the C++ driver.
    pub fn link_command(&self, input: &LinkInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.cxx);

        cmd = cmd.args(["-Os", "-Wl,--gc-sections"]);
        cmd = cmd.arg(format!("-mcpu={}", input.cpu));
        cmd = cmd.arg(format!("-T{}", input.linker_script.display()));
        cmd = cmd.arg(format!("-Wl,-Map,{}", input.map.display()));

        // Output
        cmd = cmd.arg("-o");
        cmd = cmd.arg(input.output.display().to_string());

        cmd = cmd.arg(format!("-L{}", input.lib_dir.display()));
        cmd = cmd.args(["-lm", "-lgcc", "-mthumb"]);
        cmd = cmd.args([
            "-Wl,--cref",
            "-Wl,--check-sections",
            "-Wl,--gc-sections",
        ]);
        cmd = cmd.arg(format!("-Wl,--entry={}", input.entry_symbol));
        cmd = cmd.args([
            "-Wl,--unresolved-symbols=report-all",
            "-Wl,--warn-common",
            "-Wl,--warn-section-align",
        ]);

        // Vendor archive and core archive reference each other
        cmd = cmd.arg("-Wl,--start-group");
        for item in &input.group {
            cmd = cmd.arg(item.display().to_string());
        }
        cmd = cmd.arg("-Wl,--end-group");

        cmd
    }

    /// Strip the linked image down to a raw binary.
    pub fn objcopy_command(&self, elf: &Path, bin: &Path) -> CommandSpec {
        CommandSpec::new(&self.objcopy)
            .args(["-O", "binary"])
            .arg(elf.display().to_string())
            .arg(bin.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::unit::SourceOrigin;

    fn toolchain() -> ArmToolchain {
        let config = BuildConfig {
            toolchain_bin_dir: Some(PathBuf::from("/tc/bin")),
            ..BuildConfig::default()
        };
        ArmToolchain::from_config(&config)
    }

    #[test]
    fn test_tool_paths_use_prefix() {
        let tc = toolchain();
        assert_eq!(tc.cc, PathBuf::from("/tc/bin/arm-none-eabi-gcc"));
        assert_eq!(tc.cxx, PathBuf::from("/tc/bin/arm-none-eabi-g++"));
        assert_eq!(tc.ar, PathBuf::from("/tc/bin/arm-none-eabi-ar"));
        assert_eq!(tc.objcopy, PathBuf::from("/tc/bin/arm-none-eabi-objcopy"));
    }

    #[test]
    fn test_c_compile_skips_cxx_flags() {
        let config = BuildConfig::default();
        let unit = CompilationUnit::new("wiring.c", Path::new("/core"), SourceOrigin::VendorCore, Language::C);
        let cmd = toolchain().compile_command(&config, &unit, Path::new("/b/wiring.c.o"));

        assert_eq!(cmd.program, PathBuf::from("/tc/bin/arm-none-eabi-gcc"));
        assert_eq!(cmd.args[0], "-c");
        assert!(cmd.has_arg("-mcpu=cortex-m3"));
        assert!(!cmd.has_arg("-fno-rtti"));
        assert_eq!(cmd.value_of("-o"), Some("/b/wiring.c.o"));
        assert!(cmd.has_arg("/core/wiring.c"));
    }

    #[test]
    fn test_cxx_compile_flag_order() {
        let config = BuildConfig::default();
        let unit = CompilationUnit::new("USB/CDC.cpp", Path::new("/core"), SourceOrigin::VendorCore, Language::Cxx);
        let cmd = toolchain().compile_command(&config, &unit, Path::new("/b/CDC.cpp.o"));

        assert_eq!(cmd.program, PathBuf::from("/tc/bin/arm-none-eabi-g++"));
        let pos = |a: &str| cmd.args.iter().position(|x| x == a).unwrap();
        assert!(pos("-nostdlib") < pos("-fno-rtti"));
        assert!(pos("-fno-rtti") < pos("-DUSBCON"));
        assert!(cmd.args.iter().any(|a| a.starts_with("-I")));
        assert!(pos("/core/USB/CDC.cpp") < pos("-o"));
    }

    #[test]
    fn test_archive_command() {
        let cmd = toolchain().archive_command(
            Path::new("/b/core.a"),
            &[PathBuf::from("/b/a.c.o"), PathBuf::from("/b/b.cpp.o")],
        );
        assert_eq!(cmd.args, vec!["rcs", "/b/core.a", "/b/a.c.o", "/b/b.cpp.o"]);
    }

    #[test]
    fn test_link_command_group_bracket() {
        let input = LinkInput {
            output: PathBuf::from("/b/app.elf"),
            map: PathBuf::from("/b/app.map"),
            linker_script: PathBuf::from("/v/flash.ld"),
            cpu: "cortex-m3".to_string(),
            entry_symbol: "Reset_Handler".to_string(),
            lib_dir: PathBuf::from("/b"),
            group: vec![
                PathBuf::from("/b/libmruby.a"),
                PathBuf::from("/b/syscalls_sam3.c.o"),
                PathBuf::from("/b/app.cpp.o"),
                PathBuf::from("/v/libsam.a"),
                PathBuf::from("/b/core.a"),
            ],
        };
        let cmd = toolchain().link_command(&input);

        assert_eq!(cmd.program, PathBuf::from("/tc/bin/arm-none-eabi-g++"));
        assert!(cmd.has_arg("-T/v/flash.ld"));
        assert!(cmd.has_arg("-Wl,-Map,/b/app.map"));
        assert!(cmd.has_arg("-Wl,--entry=Reset_Handler"));
        assert!(cmd.has_arg("-Wl,--unresolved-symbols=report-all"));
        assert!(!cmd.has_arg("-Wl,--warn-unresolved-symbols"));
        assert_eq!(cmd.value_of("-o"), Some("/b/app.elf"));

        let start = cmd.args.iter().position(|a| a == "-Wl,--start-group").unwrap();
        let end = cmd.args.iter().position(|a| a == "-Wl,--end-group").unwrap();
        assert_eq!(end, cmd.args.len() - 1);
        assert_eq!(
            &cmd.args[start + 1..end],
            &["/b/libmruby.a", "/b/syscalls_sam3.c.o", "/b/app.cpp.o", "/v/libsam.a", "/b/core.a"]
        );
    }

    #[test]
    fn test_objcopy_command() {
        let cmd = toolchain().objcopy_command(Path::new("/b/app.elf"), Path::new("/b/app.bin"));
        assert_eq!(cmd.display(), "/tc/bin/arm-none-eabi-objcopy -O binary /b/app.elf /b/app.bin");
        assert_eq!(cmd.program_name(), "arm-none-eabi-objcopy");
    }
}
