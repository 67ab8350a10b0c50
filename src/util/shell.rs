//! Terminal output for the pipeline.
//!
//! All operator-facing output goes through [`Shell`]:
//! - stage banners (`Compiling`, `Linking`, `Uploading`, ...)
//! - raw tool output, printed verbatim when a tool says anything
//! - a compile progress bar (via indicatif)
//! - JSON events for `--message-format json`
//!
//! Status lines go to stderr; stdout carries tool output, `--plan` and JSON.

use std::fmt::Display;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

/// Shell output mode. Human and Json are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellMode {
    /// Human-readable output with optional colors and progress bars.
    Human {
        verbosity: Verbosity,
        color: ColorChoice,
    },
    /// Machine-readable JSON lines on stdout only.
    Json,
}

impl Default for ShellMode {
    fn default() -> Self {
        ShellMode::Human {
            verbosity: Verbosity::Normal,
            color: ColorChoice::Auto,
        }
    }
}

/// Output verbosity level (Human mode only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// --quiet: errors and tool output only
    Quiet,
    #[default]
    Normal,
    /// --verbose: full command lines, no progress bar
    Verbose,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Use colors when stderr is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "invalid color choice '{}'; expected 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

/// Status words, one per pipeline activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    // Success (green)
    Finished,
    Removed,

    // In progress (cyan)
    Preparing,
    Compiling,
    Archiving,
    Linking,
    Packing,
    Resetting,
    Uploading,

    // Info (blue)
    Info,

    // Warning (yellow)
    Skipped,
    Warning,

    // Error (red)
    Error,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Finished => "Finished",
            Status::Removed => "Removed",
            Status::Preparing => "Preparing",
            Status::Compiling => "Compiling",
            Status::Archiving => "Archiving",
            Status::Linking => "Linking",
            Status::Packing => "Packing",
            Status::Resetting => "Resetting",
            Status::Uploading => "Uploading",
            Status::Info => "Info",
            Status::Skipped => "Skipped",
            Status::Warning => "Warning",
            Status::Error => "error",
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            Status::Finished | Status::Removed => "\x1b[1;32m",
            Status::Preparing
            | Status::Compiling
            | Status::Archiving
            | Status::Linking
            | Status::Packing
            | Status::Resetting
            | Status::Uploading => "\x1b[1;36m",
            Status::Info => "\x1b[1;34m",
            Status::Skipped | Status::Warning => "\x1b[1;33m",
            Status::Error => "\x1b[1;31m",
        }
    }
}

/// Width the status word is right-aligned to.
const STATUS_WIDTH: usize = 12;

/// Central shell for all CLI output.
#[derive(Debug)]
pub struct Shell {
    mode: ShellMode,
    use_color: bool,
}

impl Shell {
    pub fn new(mode: ShellMode) -> Self {
        let use_color = match &mode {
            ShellMode::Json => false,
            ShellMode::Human { color, .. } => match color {
                ColorChoice::Auto => io::stderr().is_terminal(),
                ColorChoice::Always => true,
                ColorChoice::Never => false,
            },
        };

        Shell { mode, use_color }
    }

    /// Create a shell from CLI flags. JSON mode takes precedence over quiet/verbose.
    pub fn from_flags(quiet: bool, verbose: bool, color: ColorChoice, message_format_json: bool) -> Self {
        let mode = if message_format_json {
            ShellMode::Json
        } else {
            let verbosity = if quiet {
                Verbosity::Quiet
            } else if verbose {
                Verbosity::Verbose
            } else {
                Verbosity::Normal
            };
            ShellMode::Human { verbosity, color }
        };

        Shell::new(mode)
    }

    /// A shell that prints nothing but errors and tool output.
    pub fn quiet() -> Self {
        Shell::new(ShellMode::Human {
            verbosity: Verbosity::Quiet,
            color: ColorChoice::Never,
        })
    }

    pub fn is_quiet(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Quiet,
                ..
            }
        )
    }

    pub fn is_verbose(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Verbose,
                ..
            }
        )
    }

    pub fn is_json(&self) -> bool {
        matches!(self.mode, ShellMode::Json)
    }

    /// Print a status line: `{status:>12} {message}`.
    ///
    /// Quiet mode keeps only errors; JSON mode drops everything (use
    /// [`Shell::event`] instead).
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.is_json() {
            return;
        }
        if self.is_quiet() && status != Status::Error {
            return;
        }

        eprintln!("{} {}", self.format_status(status), msg);
    }

    pub fn note(&self, msg: impl Display) {
        self.status(Status::Info, msg);
    }

    pub fn warn(&self, msg: impl Display) {
        self.status(Status::Warning, msg);
    }

    /// Print an error. In JSON mode this becomes an error event.
    pub fn error(&self, msg: impl Display) {
        if self.is_json() {
            self.event(&serde_json::json!({
                "reason": "error",
                "message": msg.to_string()
            }));
        } else {
            self.status(Status::Error, msg);
        }
    }

    /// Print a full command line, verbose mode only.
    pub fn command(&self, line: impl Display) {
        if self.is_verbose() {
            eprintln!("{:>width$} `{}`", "Running", line, width = STATUS_WIDTH);
        }
    }

    /// Print whatever a tool wrote, exactly as it wrote it, to stdout.
    ///
    /// Shown in every human mode, including quiet. JSON mode wraps it in a
    /// `tool-output` event instead.
    pub fn tool_output(&self, tool: &str, text: &str) {
        if text.trim().is_empty() {
            return;
        }

        if self.is_json() {
            self.event(&serde_json::json!({
                "reason": "tool-output",
                "tool": tool,
                "text": text
            }));
            return;
        }

        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        if !text.ends_with('\n') {
            let _ = stdout.write_all(b"\n");
        }
        let _ = stdout.flush();
    }

    /// Write one JSON line to stdout. Ignored in human mode.
    pub fn event<T: Serialize>(&self, event: &T) {
        if !self.is_json() {
            return;
        }

        match serde_json::to_string(event) {
            Ok(line) => {
                println!("{}", line);
                let _ = io::stdout().flush();
            }
            Err(e) => tracing::debug!("dropping unserializable event: {}", e),
        }
    }

    fn format_status(&self, status: Status) -> String {
        let text = status.as_str();
        if self.use_color {
            format!("{}{:>width$}\x1b[0m", status.color_code(), text, width = STATUS_WIDTH)
        } else {
            format!("{:>width$}", text, width = STATUS_WIDTH)
        }
    }

    /// Start timing a whole run; see [`Span::finish`].
    pub fn span(self: &Arc<Self>) -> Span {
        Span {
            shell: Arc::clone(self),
            start: Instant::now(),
        }
    }

    /// Create a progress bar over `total` items.
    ///
    /// Quiet, verbose and JSON modes get a bar that draws nothing.
    pub fn progress(self: &Arc<Self>, total: u64, msg: impl Display) -> Progress {
        Progress::new(Arc::clone(self), total, msg.to_string())
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(ShellMode::default())
    }
}

/// Times a run from creation to [`Span::finish`].
pub struct Span {
    shell: Arc<Shell>,
    start: Instant,
}

impl Span {
    /// Print `Finished {msg} in {elapsed}`.
    pub fn finish(self, msg: impl Display) {
        let elapsed = self.start.elapsed();
        self.shell
            .status(Status::Finished, format!("{} in {}", msg, format_duration(elapsed)));
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Progress bar that respects the shell mode.
pub struct Progress {
    shell: Arc<Shell>,
    pb: Option<ProgressBar>,
    total: u64,
    current: u64,
    message: String,
}

impl Progress {
    fn new(shell: Arc<Shell>, total: u64, message: String) -> Self {
        let pb = if shell.is_quiet() || shell.is_verbose() || shell.is_json() || total <= 1 {
            None
        } else {
            let pb = ProgressBar::new(total);
            if let Ok(style) =
                ProgressStyle::default_bar().template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb.set_message(message.clone());
            Some(pb)
        };

        Progress {
            shell,
            pb,
            total,
            current: 0,
            message,
        }
    }

    /// Advance by `delta` items.
    pub fn inc(&mut self, delta: u64) {
        self.current += delta;

        if let Some(pb) = &self.pb {
            pb.inc(delta);
        }

        if self.shell.is_json() {
            self.shell.event(&serde_json::json!({
                "reason": "build-progress",
                "current": self.current,
                "total": self.total,
                "message": self.message
            }));
        }
    }

    /// Print a line above the bar without tearing it.
    pub fn println(&self, line: impl Display) {
        match &self.pb {
            Some(pb) => pb.suspend(|| eprintln!("{}", line)),
            None => eprintln!("{}", line),
        }
    }

    /// Run `f` with the bar hidden, for multi-line tool output.
    pub fn suspend<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.pb {
            Some(pb) => pb.suspend(f),
            None => f(),
        }
    }

    pub fn finish(&self) {
        if let Some(pb) = &self.pb {
            pb.finish_and_clear();
        }
    }

    pub fn position(&self) -> u64 {
        self.current
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}
