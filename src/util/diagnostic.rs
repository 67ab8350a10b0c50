//! User-friendly diagnostic messages.
//!
//! Every fatal pipeline error is rendered through [`Diagnostic`] so the
//! operator sees the root cause, the tail of the tool output, and a next step.

use std::fmt;
use std::path::PathBuf;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when a tool cannot be started.
    pub const RUN_DOCTOR: &str = "Run `dueflash doctor` to check the toolchain and uploader paths";

    /// Suggestion when staging inputs are missing.
    pub const CHECK_INPUTS: &str =
        "Check `user_files` and `user_library` in Dueflash.toml exist in the working directory";

    /// Suggestion when a strict-mode compile fails.
    pub const LENIENT_MODE: &str =
        "Drop `--strict` to keep building past compiler errors (the link will likely fail)";

    /// Suggestion when the link fails.
    pub const CHECK_MAP: &str =
        "Inspect the link map in the build directory for unresolved symbols";

    /// Suggestion when the serial port cannot be opened.
    pub const CHECK_PORT: &str =
        "Check the board is plugged in and `--port` names its serial device";

    /// Suggestion when the device is slow to enumerate.
    pub const RESET_RETRIES: &str =
        "Raise `reset_attempts` in Dueflash.toml if the board re-enumerates slowly";

    /// Suggestion when the bootloader does not answer.
    pub const PRESS_ERASE: &str =
        "Press ERASE then RESET on the board and run `dueflash flash` again";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
    Help,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
            Severity::Help => write!(f, "help"),
        }
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related location (file path)
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Error,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Warning,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add a file location.
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        // Severity prefix with optional color
        let severity_str = if color {
            match self.severity {
                Severity::Error => "\x1b[1;31merror\x1b[0m",
                Severity::Warning => "\x1b[1;33mwarning\x1b[0m",
                Severity::Note => "\x1b[1;36mnote\x1b[0m",
                Severity::Help => "\x1b[1;32mhelp\x1b[0m",
            }
        } else {
            match self.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Note => "note",
                Severity::Help => "help",
            }
        };

        // Main message
        output.push_str(&format!("{}: {}\n", severity_str, self.message));

        // Location if present
        if let Some(ref path) = self.location {
            output.push_str(&format!("  --> {}\n", path.display()));
        }

        // Context lines
        for ctx in &self.context {
            output.push_str(&format!("  -> {}\n", ctx));
        }

        // Suggestions
        if !self.suggestions.is_empty() {
            output.push('\n');
            let help_prefix = if color {
                "\x1b[1;32mhelp\x1b[0m"
            } else {
                "help"
            };
            output.push_str(&format!("{}: consider:\n", help_prefix));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_formatting() {
        let diag = Diagnostic::error("linking failed for `build/mruby.cpp.elf`")
            .with_context("undefined reference to `loop'")
            .with_location("build/mruby.cpp.map")
            .with_suggestion("Define `loop()` in the user source")
            .with_suggestion(suggestions::CHECK_MAP);

        let output = diag.format(false);
        assert!(output.contains("error: linking failed"));
        assert!(output.contains("--> build/mruby.cpp.map"));
        assert!(output.contains("-> undefined reference"));
        assert!(output.contains("help: consider:"));
        assert!(output.contains("1. Define `loop()`"));
    }

    #[test]
    fn test_warning_severity() {
        let diag = Diagnostic::warning("compiler exited with status 1");
        assert_eq!(diag.severity, Severity::Warning);
        assert!(diag.format(false).starts_with("warning: "));
    }
}
