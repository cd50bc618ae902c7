//! Read-only commands: validate, list, ports, plan

use anyhow::{bail, Result};
use devauto_core::{validate as validate_workspace, ExecutionPlan, PlanTrigger, Severity, Workspace};

/// Print validation issues; returns whether the workspace is free of errors
pub fn validate(workspace: &Workspace, json: bool) -> Result<bool> {
    if workspace.descriptor().is_none() && workspace.manifest().is_none() {
        bail!(
            "No devcontainer.json or automation manifest found in {}",
            workspace.root().display()
        );
    }

    let report = validate_workspace(workspace);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report.is_ok());
    }

    for path in [workspace.descriptor_path(), workspace.manifest_path()]
        .into_iter()
        .flatten()
    {
        println!("Checked {}", path.display());
    }

    for issue in &report.issues {
        let marker = match issue.severity {
            Severity::Error => "✗",
            Severity::Warning => "!",
        };
        println!("  {} {}", marker, issue);
    }

    let errors = report.error_count();
    let warnings = report.issues.len() - errors;
    if errors == 0 {
        println!("OK ({} warning(s))", warnings);
    } else {
        println!("{} error(s), {} warning(s)", errors, warnings);
    }
    Ok(report.is_ok())
}

/// List tasks with triggers and dependencies
pub fn list(workspace: &Workspace) -> Result<()> {
    let manifest = workspace.require_manifest()?;

    if manifest.tasks.is_empty() {
        println!("No tasks defined.");
        return Ok(());
    }

    const ID_WIDTH: usize = 24;
    const TRIGGER_WIDTH: usize = 24;

    println!("  {:<ID_WIDTH$} {:<TRIGGER_WIDTH$} DEPENDS ON", "TASK", "TRIGGERED BY");
    println!("{}", "-".repeat(75));

    for (id, task) in &manifest.tasks {
        let triggers = if task.triggered_by.is_empty() {
            "-".to_string()
        } else {
            task.triggered_by
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let deps = if task.depends_on.is_empty() {
            "-".to_string()
        } else {
            task.depends_on.join(", ")
        };
        println!("  {:<ID_WIDTH$} {:<TRIGGER_WIDTH$} {}", id, triggers, deps);
        if let Some(description) = task.description.as_deref().or(task.name.as_deref()) {
            println!("      {}", description);
        }
    }

    Ok(())
}

/// List forwarded ports
pub fn ports(workspace: &Workspace) {
    let ports = workspace.forwarded_ports();
    if ports.is_empty() {
        println!("No forwarded ports.");
        return;
    }

    const PORT_WIDTH: usize = 16;
    const POLICY_WIDTH: usize = 16;

    println!("  {:<PORT_WIDTH$} {:<POLICY_WIDTH$} LABEL", "PORT", "ON AUTO FORWARD");
    println!("{}", "-".repeat(60));
    for port in ports {
        let policy = port
            .on_auto_forward
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<PORT_WIDTH$} {:<POLICY_WIDTH$} {}",
            port.port.to_string(),
            policy,
            port.label.as_deref().unwrap_or("-")
        );
    }
}

/// Print the execution plan for a trigger
pub fn plan(workspace: &Workspace, start: bool, tasks: Vec<String>, json: bool) -> Result<()> {
    let manifest = workspace.require_manifest()?;
    let trigger = if start || tasks.is_empty() {
        PlanTrigger::Start
    } else {
        PlanTrigger::Manual(tasks)
    };
    let plan = ExecutionPlan::build(manifest, trigger)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    if plan.is_empty() {
        println!("Nothing to run for {}.", plan.trigger);
        return Ok(());
    }

    println!("Plan for {}:", plan.trigger);
    for (n, step) in plan.steps.iter().enumerate() {
        let after = if step.depends_on.is_empty() {
            String::new()
        } else {
            format!(" (after {})", step.depends_on.join(", "))
        };
        println!("  {}. {} [{}]{}", n + 1, step.id, step.reason, after);
    }
    Ok(())
}
