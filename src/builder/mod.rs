//! Cross-compilation pipeline.
//!
//! Each stage is a function or small driver over a [`BuildContext`]:
//! staging ([`workspace`]), compilation ([`compile`]), archiving
//! ([`archive`]), linking ([`link`]) and packing ([`pack`]).

pub mod archive;
pub mod compile;
pub mod context;
pub mod events;
pub mod link;
pub mod pack;
pub mod toolchain;
pub mod workspace;

pub use archive::Archiver;
pub use compile::Compiler;
pub use context::BuildContext;
pub use events::{PipelineEvent, Stage};
pub use toolchain::{ArmToolchain, CommandSpec, LinkInput};
