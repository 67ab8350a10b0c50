//! High-level operations.
//!
//! This module contains the implementation of dueflash commands.

pub mod doctor;
pub mod dueflash_build;

pub use doctor::{doctor, format_report, CheckResult, DoctorOptions, DoctorReport};
pub use dueflash_build::{build, plan, BuildReport, PlannedStep};
