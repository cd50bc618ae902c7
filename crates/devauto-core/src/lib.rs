//! Core logic for devauto
//!
//! This crate provides:
//! - Workspace discovery (devcontainer.json + automation manifest)
//! - Well-formedness validation of both files
//! - The `dependsOn` task graph and execution planning per trigger
//! - A task runner with a pluggable executor (local shell by default)

mod error;
mod executor;
mod graph;
mod plan;
mod runner;
mod validate;
mod workspace;

pub use error::*;
pub use executor::{ExecContext, ExecResult, ShellExecutor, TaskExecutor, TASK_ID_ENV};
pub use graph::*;
pub use plan::*;
pub use runner::*;
pub use validate::*;
pub use workspace::*;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
