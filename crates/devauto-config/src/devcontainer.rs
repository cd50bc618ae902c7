//! devcontainer.json configuration parsing
//!
//! Covers the parts of the devcontainer.json format that describe the
//! environment: image, features and port forwarding. Everything else is kept
//! in `extra` so nothing is lost on a round trip.

use crate::jsonc::strip_json_comments;
use crate::{ConfigError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment descriptor (devcontainer.json)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DevContainerConfig {
    /// Name of the dev container
    pub name: Option<String>,

    /// Base image
    pub image: Option<String>,

    /// Build configuration (alternative to `image`)
    pub build: Option<BuildConfig>,

    /// Features to apply, keyed by feature reference
    #[serde(default)]
    pub features: IndexMap<String, FeatureConfig>,

    /// Ports to forward, in declaration order
    #[serde(default)]
    pub forward_ports: Vec<PortMapping>,

    /// Per-port attributes keyed by port, range or pattern
    #[serde(default)]
    pub ports_attributes: IndexMap<String, PortAttributes>,

    /// Attributes for ports not listed in `portsAttributes`
    pub other_ports_attributes: Option<PortAttributes>,

    /// User that tools run as
    pub remote_user: Option<String>,

    /// Environment variables for the container
    pub container_env: Option<HashMap<String, String>>,

    /// Options we don't explicitly handle
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Build configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    pub dockerfile: Option<String>,
    pub context: Option<String>,
    pub args: Option<HashMap<String, String>>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Feature configuration - can be boolean, version string, or options object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FeatureConfig {
    Bool(bool),
    Version(String),
    Options(IndexMap<String, serde_json::Value>),
}

impl FeatureConfig {
    /// Version requested for the feature, if any
    pub fn version(&self) -> Option<&str> {
        match self {
            FeatureConfig::Version(v) => Some(v),
            FeatureConfig::Options(opts) => opts.get("version").and_then(|v| v.as_str()),
            FeatureConfig::Bool(_) => None,
        }
    }

    /// `false` disables a feature; every other form enables it
    pub fn is_enabled(&self) -> bool {
        !matches!(self, FeatureConfig::Bool(false))
    }
}

/// Entry of `forwardPorts`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PortMapping {
    /// Local port number
    Number(u16),
    /// `"host:port"` form
    HostPort(String),
    /// Anything else; kept so validation can report it
    Invalid(serde_json::Value),
}

impl PortMapping {
    /// Port number, if the entry names a local port
    pub fn port(&self) -> Option<u16> {
        match self {
            PortMapping::Number(p) => Some(*p),
            PortMapping::HostPort(s) => s.rsplit_once(':').and_then(|(_, p)| p.parse().ok()),
            PortMapping::Invalid(_) => None,
        }
    }

    /// Key used to look the entry up in `portsAttributes`
    pub fn attribute_key(&self) -> String {
        match self {
            PortMapping::Number(p) => p.to_string(),
            PortMapping::HostPort(s) => s.clone(),
            PortMapping::Invalid(v) => v.to_string(),
        }
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortMapping::Number(p) => write!(f, "{}", p),
            PortMapping::HostPort(s) => write!(f, "{}", s),
            PortMapping::Invalid(v) => write!(f, "{}", v),
        }
    }
}

/// Attributes for a forwarded port
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortAttributes {
    pub label: Option<String>,
    pub on_auto_forward: Option<OnAutoForward>,
    pub protocol: Option<String>,
    pub require_local_port: Option<bool>,
    pub elevate_if_needed: Option<bool>,
}

/// What the host does when a port is auto-forwarded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OnAutoForward {
    Notify,
    OpenBrowser,
    OpenBrowserOnce,
    OpenPreview,
    Silent,
    Ignore,
    /// Value the host may or may not understand
    Other(String),
}

impl OnAutoForward {
    pub fn as_str(&self) -> &str {
        match self {
            OnAutoForward::Notify => "notify",
            OnAutoForward::OpenBrowser => "openBrowser",
            OnAutoForward::OpenBrowserOnce => "openBrowserOnce",
            OnAutoForward::OpenPreview => "openPreview",
            OnAutoForward::Silent => "silent",
            OnAutoForward::Ignore => "ignore",
            OnAutoForward::Other(s) => s,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, OnAutoForward::Other(_))
    }
}

impl From<String> for OnAutoForward {
    fn from(s: String) -> Self {
        match s.as_str() {
            "notify" => OnAutoForward::Notify,
            "openBrowser" => OnAutoForward::OpenBrowser,
            "openBrowserOnce" => OnAutoForward::OpenBrowserOnce,
            "openPreview" => OnAutoForward::OpenPreview,
            "silent" => OnAutoForward::Silent,
            "ignore" => OnAutoForward::Ignore,
            _ => OnAutoForward::Other(s),
        }
    }
}

impl From<OnAutoForward> for String {
    fn from(v: OnAutoForward) -> Self {
        v.as_str().to_string()
    }
}

impl fmt::Display for OnAutoForward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed form of a `portsAttributes` key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKey {
    Single(u16),
    Range(u16, u16),
    /// Anything else (process-name patterns and the like)
    Pattern,
}

impl PortKey {
    pub fn parse(key: &str) -> Self {
        let key = key.trim();
        if let Ok(p) = key.parse::<u16>() {
            return PortKey::Single(p);
        }
        if let Some((lo, hi)) = key.split_once('-') {
            if let (Ok(lo), Ok(hi)) = (lo.trim().parse::<u16>(), hi.trim().parse::<u16>()) {
                if lo <= hi {
                    return PortKey::Range(lo, hi);
                }
            }
        }
        // host:port keys match their forwardPorts entry literally
        if let Some((_, p)) = key.rsplit_once(':') {
            if let Ok(p) = p.parse::<u16>() {
                return PortKey::Single(p);
            }
        }
        PortKey::Pattern
    }

    pub fn matches(&self, port: u16) -> bool {
        match *self {
            PortKey::Single(p) => p == port,
            PortKey::Range(lo, hi) => (lo..=hi).contains(&port),
            PortKey::Pattern => false,
        }
    }
}

impl DevContainerConfig {
    /// Load devcontainer.json from a directory
    ///
    /// Searches for configuration in standard locations:
    /// 1. `.devcontainer/devcontainer.json`
    /// 2. `.devcontainer.json`
    /// 3. `.devcontainer/<folder>/devcontainer.json` (first in name order)
    pub fn load_from_dir(dir: &Path) -> Result<(Self, PathBuf)> {
        let path = Self::find_in_dir(dir).ok_or_else(|| ConfigError::NotFound(dir.join(".devcontainer")))?;
        let config = Self::load_from(&path)?;
        Ok((config, path))
    }

    /// Locate devcontainer.json without parsing it
    pub fn find_in_dir(dir: &Path) -> Option<PathBuf> {
        let candidates = [
            dir.join(".devcontainer/devcontainer.json"),
            dir.join(".devcontainer.json"),
        ];
        if let Some(found) = candidates.iter().find(|p| p.is_file()) {
            return Some(found.clone());
        }

        let entries = std::fs::read_dir(dir.join(".devcontainer")).ok()?;
        let mut subdirs: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        subdirs.sort();
        subdirs
            .into_iter()
            .map(|p| p.join("devcontainer.json"))
            .find(|p| p.is_file())
    }

    /// Load devcontainer.json from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse devcontainer.json content (JSONC)
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let content = strip_json_comments(content);

        let config: Self = serde_json::from_str(&content).map_err(|e| ConfigError::JsonParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        tracing::debug!(
            "Parsed {:?}: image={:?}, {} feature(s), {} forwarded port(s)",
            path,
            config.image,
            config.features.len(),
            config.forward_ports.len()
        );
        Ok(config)
    }

    /// Human-readable name, falling back to the image reference
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.image.as_deref())
            .unwrap_or("devcontainer")
    }

    /// Attributes for a forwarded port, falling back to `otherPortsAttributes`
    pub fn attributes_for(&self, mapping: &PortMapping) -> Option<&PortAttributes> {
        if let Some(attrs) = self.ports_attributes.get(&mapping.attribute_key()) {
            return Some(attrs);
        }
        if let Some(port) = mapping.port() {
            let by_port = self
                .ports_attributes
                .iter()
                .find(|(key, _)| PortKey::parse(key).matches(port))
                .map(|(_, attrs)| attrs);
            if by_port.is_some() {
                return by_port;
            }
        }
        self.other_ports_attributes.as_ref()
    }

    /// All forwarded port numbers in declaration order
    pub fn forward_ports_list(&self) -> Vec<u16> {
        self.forward_ports.iter().filter_map(PortMapping::port).collect()
    }
}
