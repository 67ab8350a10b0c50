//! Shared utilities

pub mod context;
pub mod diagnostic;
pub mod fs;
pub mod process;
pub mod shell;

pub use context::GlobalContext;
pub use diagnostic::Diagnostic;
pub use process::{SystemRunner, ToolOutput, ToolRunner};
pub use shell::Shell;
