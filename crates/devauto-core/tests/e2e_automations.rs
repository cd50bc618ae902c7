//! End-to-end tests for loading, validating, planning and running automations.
//!
//! The fixture tests use the Go library workspace under `tests/fixtures` and a
//! mock executor (its commands need go and npm). The shell tests run real
//! commands through `/bin/sh` in a temporary workspace.

use devauto_config::OnAutoForward;
use devauto_core::test_support::MockExecutor;
use devauto_core::{
    validate, ExecutionPlan, PlanTrigger, Runner, RunnerOptions, ShellExecutor, StepReason,
    TaskExecutor, TaskStatus, Workspace, WorkspaceOverrides,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn fixture_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/go-library")
}

fn load_fixture() -> Workspace {
    Workspace::load(&fixture_root(), &WorkspaceOverrides::default())
        .expect("fixture workspace should load")
}

/// Create a temporary workspace with the given automations.yaml
fn create_test_workspace(manifest_yaml: &str) -> TempDir {
    let temp = TempDir::new().expect("failed to create temp dir");
    let gitpod_dir = temp.path().join(".gitpod");
    std::fs::create_dir_all(&gitpod_dir).expect("failed to create .gitpod dir");
    std::fs::write(gitpod_dir.join("automations.yaml"), manifest_yaml)
        .expect("failed to write automations.yaml");
    temp
}

#[test]
fn test_fixture_is_well_formed() {
    let ws = load_fixture();
    let report = validate(&ws);
    assert!(report.issues.is_empty(), "unexpected issues: {:?}", report.issues);

    let descriptor = ws.descriptor().unwrap();
    assert_eq!(
        descriptor.image.as_deref(),
        Some("mcr.microsoft.com/devcontainers/go:1-1.22-bookworm")
    );
    assert_eq!(descriptor.features.len(), 2);

    let ports = ws.forwarded_ports();
    assert_eq!(ports.len(), 1);
    assert_eq!(ports[0].label.as_deref(), Some("Example server"));
    assert_eq!(ports[0].on_auto_forward, Some(OnAutoForward::Notify));
}

#[test]
fn test_fixture_start_plan() {
    let ws = load_fixture();
    let plan = ExecutionPlan::build(ws.require_manifest().unwrap(), PlanTrigger::Start).unwrap();
    assert_eq!(plan.task_ids(), vec!["install-dependencies", "setup-vscode"]);
    assert!(plan.steps.iter().all(|s| s.reason == StepReason::Triggered));
}

#[tokio::test]
async fn test_fixture_start_runs_setup_after_install() {
    let ws = load_fixture();
    let plan = ExecutionPlan::build(ws.require_manifest().unwrap(), PlanTrigger::Start).unwrap();
    let mock = Arc::new(MockExecutor::new());
    let runner = Runner::new(mock.clone() as Arc<dyn TaskExecutor>, RunnerOptions::default());

    let report = runner.run(&ws, &plan, None).await.unwrap();

    assert!(report.success());
    assert_eq!(mock.calls(), vec!["install-dependencies", "setup-vscode"]);
    for manual in ["test", "run-example", "build"] {
        assert!(report.status(manual).is_none(), "{} must not run on start", manual);
    }
}

#[tokio::test]
async fn test_fixture_install_failure_blocks_setup() {
    let ws = load_fixture();
    let plan = ExecutionPlan::build(ws.require_manifest().unwrap(), PlanTrigger::Start).unwrap();
    let mock = Arc::new(MockExecutor::new().with_exit_code("install-dependencies", 1));
    let runner = Runner::new(mock.clone() as Arc<dyn TaskExecutor>, RunnerOptions::default());

    let report = runner.run(&ws, &plan, None).await.unwrap();

    assert_eq!(mock.calls(), vec!["install-dependencies"]);
    assert!(matches!(
        report.status("setup-vscode"),
        Some(TaskStatus::Skipped { reason }) if reason.contains("install-dependencies")
    ));
}

#[tokio::test]
async fn test_fixture_timeout_is_a_failure() {
    let ws = load_fixture();
    let plan = ExecutionPlan::build(
        ws.require_manifest().unwrap(),
        PlanTrigger::Manual(vec!["build".into()]),
    )
    .unwrap();
    let mock = Arc::new(MockExecutor::new().with_timeout("build"));
    let runner = Runner::new(mock.clone() as Arc<dyn TaskExecutor>, RunnerOptions::default());

    let report = runner.run(&ws, &plan, None).await.unwrap();
    assert_eq!(report.status("build"), Some(&TaskStatus::TimedOut));
    assert_eq!(report.failed(), vec!["build"]);
}

#[tokio::test]
async fn test_shell_run_respects_depends_on() {
    let temp = create_test_workspace(
        r#"
tasks:
  second:
    command: echo second >> order.log
    triggeredBy: [postDevcontainerStart]
    dependsOn: [first]
  first:
    command: |
      echo first >> order.log
    triggeredBy: [postDevcontainerStart]
  later:
    command: echo later >> order.log
    triggeredBy: [manual]
"#,
    );
    let ws = Workspace::load(temp.path(), &WorkspaceOverrides::default()).unwrap();
    assert!(validate(&ws).is_ok());

    let plan = ExecutionPlan::build(ws.require_manifest().unwrap(), PlanTrigger::Start).unwrap();
    let runner = Runner::new(Arc::new(ShellExecutor::new()), RunnerOptions::default());
    let report = runner.run(&ws, &plan, None).await.unwrap();

    assert!(report.success(), "{:?}", report.outcomes);
    let log = std::fs::read_to_string(temp.path().join("order.log")).unwrap();
    assert_eq!(log, "first\nsecond\n");
}

#[tokio::test]
async fn test_shell_failure_reports_exit_code() {
    let temp = create_test_workspace(
        r#"
tasks:
  broken:
    command: |
      echo "about to fail"
      exit 7
    triggeredBy: [manual]
  after:
    command: touch should-not-exist
    triggeredBy: [manual]
    dependsOn: [broken]
"#,
    );
    let ws = Workspace::load(temp.path(), &WorkspaceOverrides::default()).unwrap();
    let plan = ExecutionPlan::build(
        ws.require_manifest().unwrap(),
        PlanTrigger::Manual(vec!["after".into()]),
    )
    .unwrap();
    let runner = Runner::new(Arc::new(ShellExecutor::new()), RunnerOptions::default());
    let report = runner.run(&ws, &plan, None).await.unwrap();

    assert_eq!(report.status("broken"), Some(&TaskStatus::Failed { exit_code: 7 }));
    assert!(matches!(report.status("after"), Some(TaskStatus::Skipped { .. })));
    assert!(!temp.path().join("should-not-exist").exists());
}

#[tokio::test]
async fn test_shell_timeout_from_options() {
    let temp = create_test_workspace(
        "tasks:\n  slow:\n    command: sleep 10\n    triggeredBy: [manual]\n",
    );
    let ws = Workspace::load(temp.path(), &WorkspaceOverrides::default()).unwrap();
    let plan = ExecutionPlan::build(
        ws.require_manifest().unwrap(),
        PlanTrigger::Manual(vec!["slow".into()]),
    )
    .unwrap();
    let options = RunnerOptions {
        timeout: Some(Duration::from_millis(300)),
        ..Default::default()
    };
    let runner = Runner::new(Arc::new(ShellExecutor::new()), options);
    let report = runner.run(&ws, &plan, None).await.unwrap();

    assert_eq!(report.status("slow"), Some(&TaskStatus::TimedOut));
}

#[tokio::test]
async fn test_cancelled_run_kills_running_commands() {
    let temp = create_test_workspace(
        r#"
tasks:
  long:
    command: |
      /bin/sh -c 'sleep 1; touch escaped'
      touch finished
    triggeredBy: [manual]
"#,
    );
    let ws = Workspace::load(temp.path(), &WorkspaceOverrides::default()).unwrap();
    let plan = ExecutionPlan::build(
        ws.require_manifest().unwrap(),
        PlanTrigger::Manual(vec!["long".into()]),
    )
    .unwrap();
    let runner = Runner::new(Arc::new(ShellExecutor::new()), RunnerOptions::default());

    // Same as the CLI's Ctrl-C handling: the run future is dropped mid-task
    let cancelled = tokio::time::timeout(Duration::from_millis(200), runner.run(&ws, &plan, None)).await;
    assert!(cancelled.is_err());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!temp.path().join("escaped").exists());
    assert!(!temp.path().join("finished").exists());
}

#[test]
fn test_cyclic_manifest_cannot_be_planned() {
    let temp = create_test_workspace(
        r#"
tasks:
  a: { command: "true", triggeredBy: [postDevcontainerStart], dependsOn: [b] }
  b: { command: "true", triggeredBy: [manual], dependsOn: [a] }
"#,
    );
    let ws = Workspace::load(temp.path(), &WorkspaceOverrides::default()).unwrap();
    let report = validate(&ws);
    assert_eq!(report.error_count(), 1);

    let err = ExecutionPlan::build(ws.require_manifest().unwrap(), PlanTrigger::Start).unwrap_err();
    assert!(err.to_string().contains("cycle"));
}
