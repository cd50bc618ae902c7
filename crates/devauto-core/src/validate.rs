//! Well-formedness checks for the descriptor and the manifest
//!
//! Validation collects every problem instead of stopping at the first one.
//! Errors make a workspace unusable for running tasks; warnings are reported
//! and otherwise ignored.

use crate::{TaskGraph, Workspace};
use devauto_config::{AutomationManifest, DevContainerConfig, PortKey};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    /// What the finding is about, e.g. `tasks.setup-vscode` or `portsAttributes.8080`
    pub subject: String,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.subject, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    fn push(&mut self, severity: Severity, subject: impl Into<String>, message: impl Into<String>) {
        self.issues.push(Issue {
            severity,
            subject: subject.into(),
            message: message.into(),
        });
    }

    fn error(&mut self, subject: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Error, subject, message);
    }

    fn warn(&mut self, subject: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Warning, subject, message);
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// True when there are no errors (warnings are allowed)
    pub fn is_ok(&self) -> bool {
        self.error_count() == 0
    }

    fn extend(&mut self, other: ValidationReport) {
        self.issues.extend(other.issues);
    }
}

/// Validate everything the workspace contains
pub fn validate(workspace: &Workspace) -> ValidationReport {
    let mut report = ValidationReport::default();
    if let Some(descriptor) = workspace.descriptor() {
        report.extend(validate_descriptor(descriptor));
    }
    if let Some(manifest) = workspace.manifest() {
        report.extend(validate_manifest(manifest));
    }
    tracing::debug!(
        "Validation finished: {} error(s), {} warning(s)",
        report.error_count(),
        report.warnings().count()
    );
    report
}

/// Checks for the environment descriptor
pub fn validate_descriptor(descriptor: &DevContainerConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    if descriptor.image.is_none() && descriptor.build.is_none() {
        report.warn("image", "no image or build configured");
    }

    let mut seen = HashSet::new();
    for mapping in &descriptor.forward_ports {
        match mapping.port() {
            Some(0) => report.error(format!("forwardPorts.{}", mapping), "port 0 cannot be forwarded"),
            Some(_) => {}
            None => report.error(
                format!("forwardPorts.{}", mapping),
                "expected a port number or \"host:port\"",
            ),
        }
        if !seen.insert(mapping.attribute_key()) {
            report.warn(format!("forwardPorts.{}", mapping), "port is listed more than once");
        }
    }

    let forwarded = descriptor.forward_ports_list();
    for (key, attrs) in &descriptor.ports_attributes {
        let subject = format!("portsAttributes.{}", key);
        match PortKey::parse(key) {
            PortKey::Pattern => {
                report.warn(&subject, "key is not a port or range; not checked against forwardPorts")
            }
            port_key => {
                let listed = descriptor.forward_ports.iter().any(|m| m.attribute_key() == *key)
                    || forwarded.iter().any(|&p| port_key.matches(p));
                if !listed {
                    report.warn(&subject, "port has attributes but is not in forwardPorts");
                }
            }
        }
        if let Some(policy) = &attrs.on_auto_forward {
            if !policy.is_known() {
                report.warn(&subject, format!("unrecognized onAutoForward value '{}'", policy));
            }
        }
    }

    if let Some(policy) = descriptor
        .other_ports_attributes
        .as_ref()
        .and_then(|a| a.on_auto_forward.as_ref())
    {
        if !policy.is_known() {
            report.warn(
                "otherPortsAttributes",
                format!("unrecognized onAutoForward value '{}'", policy),
            );
        }
    }

    report
}

/// Checks for the automation manifest
pub fn validate_manifest(manifest: &AutomationManifest) -> ValidationReport {
    let mut report = ValidationReport::default();

    for (id, task) in &manifest.tasks {
        let subject = format!("tasks.{}", id);

        if id.trim().is_empty() {
            report.error(&subject, "task id is empty");
        }
        if task.command.trim().is_empty() {
            report.error(&subject, "command is empty");
        }

        if task.triggered_by.is_empty() {
            report.warn(
                &subject,
                "no triggeredBy; runs only as a dependency or when named explicitly",
            );
        }
        for trigger in &task.triggered_by {
            if !trigger.is_known() {
                report.error(
                    &subject,
                    format!(
                        "unrecognized trigger '{}' (expected postDevcontainerStart or manual)",
                        trigger
                    ),
                );
            }
        }

        for dep in &task.depends_on {
            if dep == id {
                report.error(&subject, "task depends on itself");
            } else if !manifest.tasks.contains_key(dep) {
                report.error(&subject, format!("dependsOn references unknown task '{}'", dep));
            }
        }
    }

    // Self-dependencies are already reported above
    for cycle in TaskGraph::find_cycles(manifest) {
        if cycle.len() > 2 {
            report.error("tasks", format!("dependency cycle: {}", cycle.join(" -> ")));
        }
    }

    for id in manifest.services.keys() {
        report.warn(format!("services.{}", id), "services are not run by devauto");
    }

    report
}
