//! Error types for devauto-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] devauto_config::ConfigError),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("Dependency cycle between tasks: {0}")]
    DependencyCycle(String),

    #[error("Validation failed with {0} error(s)")]
    ValidationFailed(usize),

    #[error("No automation manifest found in {0}")]
    NoManifest(std::path::PathBuf),

    #[error("Exec failed: {0}")]
    ExecFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
