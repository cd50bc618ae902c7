//! Workspace discovery: locate and load the descriptor and the manifest

use crate::{CoreError, Result};
use devauto_config::{AutomationManifest, DevContainerConfig, OnAutoForward, PortMapping};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Explicit file locations that bypass discovery
#[derive(Debug, Clone, Default)]
pub struct WorkspaceOverrides {
    pub devcontainer: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
}

/// A loaded workspace: root directory plus whichever files were found
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    descriptor: Option<(DevContainerConfig, PathBuf)>,
    manifest: Option<(AutomationManifest, PathBuf)>,
}

/// A forwarded port with its resolved attributes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardedPort {
    pub port: PortMapping,
    pub label: Option<String>,
    pub on_auto_forward: Option<OnAutoForward>,
}

impl Workspace {
    /// Load a workspace rooted at `root` (`~` is expanded).
    ///
    /// Both files are optional at this point; callers that need the manifest
    /// use [`Workspace::require_manifest`].
    pub fn load(root: &Path, overrides: &WorkspaceOverrides) -> Result<Self> {
        let root = expand_path(root);

        let descriptor_path = match &overrides.devcontainer {
            Some(p) => Some(resolve(&root, p)),
            None => DevContainerConfig::find_in_dir(&root),
        };
        let descriptor = match descriptor_path {
            Some(path) => {
                let config = DevContainerConfig::load_from(&path)?;
                tracing::debug!("Loaded environment descriptor from {:?}", path);
                Some((config, path))
            }
            None => {
                tracing::debug!("No devcontainer.json found under {:?}", root);
                None
            }
        };

        let manifest_path = match &overrides.manifest {
            Some(p) => Some(resolve(&root, p)),
            None => AutomationManifest::find_in_dir(&root),
        };
        let manifest = match manifest_path {
            Some(path) => {
                let manifest = AutomationManifest::load_from(&path)?;
                tracing::debug!("Loaded automation manifest from {:?}", path);
                if !manifest.services.is_empty() {
                    tracing::warn!(
                        "{} service(s) declared in {:?} are not run by devauto",
                        manifest.services.len(),
                        path
                    );
                }
                Some((manifest, path))
            }
            None => {
                tracing::debug!("No automation manifest found under {:?}", root);
                None
            }
        };

        Ok(Self {
            root,
            descriptor,
            manifest,
        })
    }

    /// Build a workspace from already-parsed parts
    pub fn from_parts(
        root: impl Into<PathBuf>,
        descriptor: Option<DevContainerConfig>,
        manifest: Option<AutomationManifest>,
    ) -> Self {
        let root = root.into();
        Self {
            descriptor: descriptor.map(|d| (d, root.join(".devcontainer/devcontainer.json"))),
            manifest: manifest.map(|m| (m, root.join(".gitpod/automations.yaml"))),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn descriptor(&self) -> Option<&DevContainerConfig> {
        self.descriptor.as_ref().map(|(d, _)| d)
    }

    pub fn descriptor_path(&self) -> Option<&Path> {
        self.descriptor.as_ref().map(|(_, p)| p.as_path())
    }

    pub fn manifest(&self) -> Option<&AutomationManifest> {
        self.manifest.as_ref().map(|(m, _)| m)
    }

    pub fn manifest_path(&self) -> Option<&Path> {
        self.manifest.as_ref().map(|(_, p)| p.as_path())
    }

    /// The manifest, or an error naming the workspace when there is none
    pub fn require_manifest(&self) -> Result<&AutomationManifest> {
        self.manifest()
            .ok_or_else(|| CoreError::NoManifest(self.root.clone()))
    }

    /// Forwarded ports with labels and policies, in declaration order
    pub fn forwarded_ports(&self) -> Vec<ForwardedPort> {
        let Some(descriptor) = self.descriptor() else {
            return Vec::new();
        };
        descriptor
            .forward_ports
            .iter()
            .map(|mapping| {
                let attrs = descriptor.attributes_for(mapping);
                ForwardedPort {
                    port: mapping.clone(),
                    label: attrs.and_then(|a| a.label.clone()),
                    on_auto_forward: attrs.and_then(|a| a.on_auto_forward.clone()),
                }
            })
            .collect()
    }
}

fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    let path = expand_path(path);
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}
