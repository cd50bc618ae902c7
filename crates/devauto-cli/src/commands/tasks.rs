//! Task execution commands: start, run

use anyhow::{bail, Result};
use devauto_core::{
    validate as validate_workspace, ExecutionPlan, PlanTrigger, RunReport, Runner, RunnerOptions,
    ShellExecutor, TaskStatus, Workspace,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Run the postDevcontainerStart tasks
pub async fn start(workspace: &Workspace, options: RunnerOptions) -> Result<bool> {
    execute(workspace, PlanTrigger::Start, options).await
}

/// Run the named tasks and their dependencies
pub async fn run_tasks(workspace: &Workspace, tasks: Vec<String>, options: RunnerOptions) -> Result<bool> {
    if tasks.is_empty() {
        bail!("No tasks specified");
    }
    execute(workspace, PlanTrigger::Manual(tasks), options).await
}

async fn execute(workspace: &Workspace, trigger: PlanTrigger, options: RunnerOptions) -> Result<bool> {
    let manifest = workspace.require_manifest()?;

    let report = validate_workspace(workspace);
    for warning in report.warnings() {
        tracing::warn!("{}", warning);
    }
    if !report.is_ok() {
        for error in report.errors() {
            eprintln!("  ✗ {}", error);
        }
        bail!(
            "Refusing to run: automation config has {} error(s); see 'devauto validate'",
            report.error_count()
        );
    }

    let plan = ExecutionPlan::build(manifest, trigger)?;
    if plan.is_empty() {
        println!("Nothing to run for {}.", plan.trigger);
        return Ok(true);
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let printer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            println!("{}", line);
        }
    });

    let runner = Runner::new(Arc::new(ShellExecutor::new()), options);
    let result = tokio::select! {
        result = runner.run(workspace, &plan, Some(tx)) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    // Dropping the run above killed every in-flight command
    let Some(result) = result else {
        printer.abort();
        eprintln!("Interrupted");
        return Ok(false);
    };
    // all senders are dropped once the run completes; flush remaining lines
    let _ = printer.await;

    let report = result?;
    print_summary(&report);
    Ok(report.success())
}

fn print_summary(report: &RunReport) {
    const ID_WIDTH: usize = 24;

    println!();
    println!("  {:<ID_WIDTH$} {:>8}  RESULT", "TASK", "TIME");
    println!("{}", "-".repeat(60));
    for (id, outcome) in &report.outcomes {
        let symbol = match outcome.status {
            TaskStatus::Succeeded => "●",
            TaskStatus::Skipped { .. } => "○",
            _ => "✗",
        };
        println!(
            "{} {:<ID_WIDTH$} {:>7.1}s  {}",
            symbol,
            id,
            outcome.duration.as_secs_f64(),
            outcome.status
        );
    }

    let failed = report.failed();
    if failed.is_empty() {
        println!("\nAll {} task(s) succeeded.", report.outcomes.len());
    } else {
        println!("\nFailed: {}", failed.join(", "));
    }
}
