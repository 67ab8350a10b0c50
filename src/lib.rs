//! dueflash - build and flash firmware for Cortex-M3 boards
//!
//! This crate provides the pipeline that stages user sources, cross-compiles
//! the vendor core, links and packs the firmware image, and programs it over
//! a serial bootloader.

pub mod builder;
pub mod core;
pub mod flash;
pub mod ops;
pub mod util;

/// Test doubles and on-disk fixtures for unit tests.
///
/// Only compiled for `cargo test`. Provides a scriptable fake toolchain,
/// a recording serial port and a miniature vendor SDK tree.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{BuildConfig, PipelineError};
pub use util::context::GlobalContext;
