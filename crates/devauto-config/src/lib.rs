//! Configuration parsing for devauto
//!
//! This crate handles parsing of:
//! - Global configuration (`~/.config/devauto/config.toml`)
//! - devcontainer.json environment descriptors (JSONC)
//! - Automation manifests (`.gitpod/automations.yaml`)

mod automations;
mod devcontainer;
mod error;
mod global;
mod jsonc;

pub use automations::*;
pub use devcontainer::*;
pub use error::*;
pub use global::*;
