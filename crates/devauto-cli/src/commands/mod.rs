//! CLI command implementations

mod inspect;
mod manage;
mod tasks;

use anyhow::{Context, Result};
use devauto_config::GlobalConfig;
use devauto_core::{RunnerOptions, Workspace, WorkspaceOverrides};
use std::path::Path;

pub use inspect::*;
pub use manage::*;
pub use tasks::*;

/// Load the workspace, attaching the directory to any error
pub fn load_workspace(root: &Path, overrides: &WorkspaceOverrides) -> Result<Workspace> {
    Workspace::load(root, overrides)
        .with_context(|| format!("Failed to load workspace at {}", root.display()))
}

/// Runner options from the global config, with command-line overrides
pub fn runner_options(config: &GlobalConfig, jobs: Option<usize>, fail_fast: bool) -> RunnerOptions {
    let mut options = RunnerOptions::from(config);
    if let Some(jobs) = jobs {
        options.max_parallel = jobs.max(1);
    }
    if fail_fast {
        options.fail_fast = true;
    }
    options
}
