//! Automation manifest parsing (`.gitpod/automations.yaml`)
//!
//! The manifest declares named tasks. Each task has a shell command body,
//! the triggers that start it and the tasks it depends on:
//!
//! ```yaml
//! tasks:
//!   install-dependencies:
//!     name: Install dependencies
//!     command: go mod download
//!     triggeredBy: [postDevcontainerStart]
//!   setup-vscode:
//!     command: npm install vscode
//!     dependsOn: [install-dependencies]
//!     triggeredBy: [postDevcontainerStart]
//! ```
//!
//! YAML is the native format. JSON (with comments) and TOML manifests are
//! accepted by file extension.

use crate::jsonc::strip_json_comments;
use crate::{ConfigError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Top-level automation manifest
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AutomationManifest {
    /// Tasks keyed by id, in declaration order
    #[serde(default)]
    pub tasks: IndexMap<String, TaskSpec>,

    /// Long-running services; parsed so they survive a round trip, never run
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub services: IndexMap<String, serde_json::Value>,

    /// Top-level keys we don't explicitly handle
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A single automation task
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Shell script body, possibly multi-line
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub triggered_by: Vec<Trigger>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl TaskSpec {
    pub fn has_trigger(&self, trigger: &Trigger) -> bool {
        self.triggered_by.contains(trigger)
    }

    /// Display name, falling back to the id
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(id)
    }
}

/// Condition that starts a task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Trigger {
    /// Once, automatically, after the dev container is ready
    PostDevcontainerStart,
    /// Only on explicit invocation
    Manual,
    /// Keyword this tool does not recognize
    Other(String),
}

impl Trigger {
    pub fn as_str(&self) -> &str {
        match self {
            Trigger::PostDevcontainerStart => "postDevcontainerStart",
            Trigger::Manual => "manual",
            Trigger::Other(s) => s,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Trigger::Other(_))
    }
}

impl From<String> for Trigger {
    fn from(s: String) -> Self {
        match s.as_str() {
            "postDevcontainerStart" => Trigger::PostDevcontainerStart,
            "manual" => Trigger::Manual,
            _ => Trigger::Other(s),
        }
    }
}

impl From<Trigger> for String {
    fn from(t: Trigger) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk manifest format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Yaml,
    Json,
    Toml,
}

impl ManifestFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Ok(ManifestFormat::Yaml),
            Some("json") | Some("jsonc") => Ok(ManifestFormat::Json),
            Some("toml") => Ok(ManifestFormat::Toml),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

impl AutomationManifest {
    /// Search locations relative to the workspace root, in priority order
    pub const CANDIDATES: [&'static str; 4] = [
        ".gitpod/automations.yaml",
        ".gitpod/automations.yml",
        "automations.yaml",
        "automations.yml",
    ];

    /// Load the manifest from a workspace directory
    pub fn load_from_dir(dir: &Path) -> Result<(Self, PathBuf)> {
        let path = Self::find_in_dir(dir)
            .ok_or_else(|| ConfigError::NotFound(dir.join(Self::CANDIDATES[0])))?;
        let manifest = Self::load_from(&path)?;
        Ok((manifest, path))
    }

    /// Locate the manifest without parsing it
    pub fn find_in_dir(dir: &Path) -> Option<PathBuf> {
        Self::CANDIDATES
            .iter()
            .map(|c| dir.join(c))
            .find(|p| p.is_file())
    }

    /// Load the manifest from a specific file, picking the format by extension
    pub fn load_from(path: &Path) -> Result<Self> {
        let format = ManifestFormat::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content, format, path)
    }

    /// Parse manifest content in the given format
    pub fn parse(content: &str, format: ManifestFormat, path: &Path) -> Result<Self> {
        let manifest: Self = match format {
            ManifestFormat::Yaml => {
                // An empty YAML document is an empty manifest, not an error
                if content.trim().is_empty() {
                    Self::default()
                } else {
                    serde_yaml::from_str(content).map_err(|e| ConfigError::YamlParseError {
                        path: path.to_path_buf(),
                        source: e,
                    })?
                }
            }
            ManifestFormat::Json => serde_json::from_str(&strip_json_comments(content))
                .map_err(|e| ConfigError::JsonParseError {
                    path: path.to_path_buf(),
                    source: e,
                })?,
            ManifestFormat::Toml => {
                toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
                    path: path.to_path_buf(),
                    source: e,
                })?
            }
        };

        tracing::debug!(
            "Parsed {:?}: {} task(s), {} service(s)",
            path,
            manifest.tasks.len(),
            manifest.services.len()
        );
        Ok(manifest)
    }

    pub fn task(&self, id: &str) -> Option<&TaskSpec> {
        self.tasks.get(id)
    }

    /// Ids of tasks carrying the given trigger, in declaration order
    pub fn tasks_triggered_by<'a>(&'a self, trigger: &'a Trigger) -> impl Iterator<Item = &'a str> + 'a {
        self.tasks
            .iter()
            .filter(move |(_, t)| t.has_trigger(trigger))
            .map(|(id, _)| id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GO_MANIFEST: &str = r#"
tasks:
  install-dependencies:
    name: Install dependencies
    description: Download Go modules
    command: |
      echo "Installing Go dependencies..."
      go mod download
    triggeredBy:
      - postDevcontainerStart
  setup-vscode:
    name: Set up VS Code
    command: npm install vscode
    triggeredBy: [postDevcontainerStart]
    dependsOn: [install-dependencies]
  test:
    name: Run tests
    command: go test ./...
    triggeredBy: [manual]
"#;

    fn parse_yaml(s: &str) -> AutomationManifest {
        AutomationManifest::parse(s, ManifestFormat::Yaml, Path::new("automations.yaml")).unwrap()
    }

    #[test]
    fn test_parse_yaml_manifest() {
        let manifest = parse_yaml(GO_MANIFEST);
        let ids: Vec<&str> = manifest.tasks.keys().map(|k| k.as_str()).collect();
        assert_eq!(ids, vec!["install-dependencies", "setup-vscode", "test"]);

        let install = manifest.task("install-dependencies").unwrap();
        assert!(install.command.contains("go mod download"));
        assert!(install.command.ends_with('\n'));
        assert_eq!(install.triggered_by, vec![Trigger::PostDevcontainerStart]);
        assert!(install.depends_on.is_empty());

        let setup = manifest.task("setup-vscode").unwrap();
        assert_eq!(setup.depends_on, vec!["install-dependencies".to_string()]);
    }

    #[test]
    fn test_tasks_triggered_by() {
        let manifest = parse_yaml(GO_MANIFEST);
        let start: Vec<&str> = manifest
            .tasks_triggered_by(&Trigger::PostDevcontainerStart)
            .collect();
        assert_eq!(start, vec!["install-dependencies", "setup-vscode"]);
        let manual: Vec<&str> = manifest.tasks_triggered_by(&Trigger::Manual).collect();
        assert_eq!(manual, vec!["test"]);
    }

    #[test]
    fn test_unknown_trigger_is_preserved() {
        let manifest = parse_yaml(
            r#"
tasks:
  odd:
    command: "true"
    triggeredBy: [postEnvironmentStart]
"#,
        );
        let odd = manifest.task("odd").unwrap();
        assert_eq!(
            odd.triggered_by,
            vec![Trigger::Other("postEnvironmentStart".to_string())]
        );
        assert!(!odd.triggered_by[0].is_known());
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let manifest = parse_yaml(GO_MANIFEST);
        let test = manifest.task("test").unwrap();
        assert_eq!(test.display_name("test"), "Run tests");
        let bare = TaskSpec::default();
        assert_eq!(bare.display_name("bare"), "bare");
    }

    #[test]
    fn test_empty_yaml_is_empty_manifest() {
        let manifest = parse_yaml("  \n");
        assert!(manifest.tasks.is_empty());
    }

    #[test]
    fn test_services_are_parsed() {
        let manifest = parse_yaml(
            r#"
services:
  database:
    commands:
      start: postgres
tasks: {}
"#,
        );
        assert!(manifest.services.contains_key("database"));
    }

    #[test]
    fn test_unknown_top_level_keys_are_kept() {
        let manifest = parse_yaml(
            r#"
version: 2
tasks:
  build:
    command: go build ./...
    triggeredBy: [manual]
"#,
        );
        assert_eq!(manifest.extra.get("version"), Some(&serde_json::json!(2)));

        let yaml = serde_yaml::to_string(&manifest).unwrap();
        assert!(yaml.contains("version: 2"));
    }

    #[test]
    fn test_parse_json_manifest() {
        let json = r#"{
            // same shape as YAML
            "tasks": {
                "build": { "command": "go build ./...", "triggeredBy": ["manual"] }
            }
        }"#;
        let manifest =
            AutomationManifest::parse(json, ManifestFormat::Json, Path::new("automations.json"))
                .unwrap();
        assert_eq!(
            manifest.task("build").unwrap().triggered_by,
            vec![Trigger::Manual]
        );
    }

    #[test]
    fn test_parse_toml_manifest() {
        let toml = r#"
[tasks.build]
command = "go build ./..."
triggeredBy = ["manual"]

[tasks.run-example]
command = "go run examples/main.go"
triggeredBy = ["manual"]
dependsOn = ["build"]
"#;
        let manifest =
            AutomationManifest::parse(toml, ManifestFormat::Toml, Path::new("automations.toml"))
                .unwrap();
        assert_eq!(manifest.tasks.len(), 2);
        assert_eq!(manifest.task("run-example").unwrap().depends_on, vec!["build"]);
    }

    #[test]
    fn test_invalid_yaml_reports_path() {
        let err = AutomationManifest::parse(
            "tasks: [not, a, map",
            ManifestFormat::Yaml,
            Path::new("broken.yaml"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = ManifestFormat::from_path(Path::new("automations.ini"));
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_load_from_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join(".gitpod")).unwrap();
        std::fs::write(tmp.path().join(".gitpod/automations.yaml"), GO_MANIFEST).unwrap();

        let (manifest, path) = AutomationManifest::load_from_dir(tmp.path()).unwrap();
        assert_eq!(manifest.tasks.len(), 3);
        assert!(path.ends_with(".gitpod/automations.yaml"));
    }

    #[test]
    fn test_load_from_dir_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let result = AutomationManifest::load_from_dir(tmp.path());
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
