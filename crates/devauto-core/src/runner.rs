//! Task runner: executes an [`ExecutionPlan`] in dependency order
//!
//! A task starts only after every dependency in the plan succeeded. When a
//! task fails, all of its dependents in the plan are skipped. Independent
//! tasks may overlap up to `max_parallel`.

use crate::executor::send_progress;
use crate::{CoreError, ExecContext, ExecResult, ExecutionPlan, PlanTrigger, Result, TaskExecutor, Workspace};
use chrono::{DateTime, Utc};
use devauto_config::GlobalConfig;
use futures::stream::{FuturesUnordered, StreamExt};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Runner settings
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub shell: String,
    pub max_parallel: usize,
    pub fail_fast: bool,
    pub timeout: Option<Duration>,
    /// Environment applied to every task, before `containerEnv`
    pub env: HashMap<String, String>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self::from(&GlobalConfig::default())
    }
}

impl From<&GlobalConfig> for RunnerOptions {
    fn from(config: &GlobalConfig) -> Self {
        Self {
            shell: config.defaults.shell.clone(),
            max_parallel: config.defaults.max_parallel.max(1),
            fail_fast: config.defaults.fail_fast,
            timeout: config.task_timeout(),
            env: config.env.clone(),
        }
    }
}

/// Final state of one planned task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TaskStatus {
    Succeeded,
    Failed {
        #[serde(rename = "exitCode")]
        exit_code: i64,
    },
    TimedOut,
    /// The command could not be started at all
    Error { message: String },
    Skipped { reason: String },
}

impl TaskStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Succeeded)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Succeeded => write!(f, "succeeded"),
            TaskStatus::Failed { exit_code } => write!(f, "failed (exit code {})", exit_code),
            TaskStatus::TimedOut => write!(f, "timed out"),
            TaskStatus::Error { message } => write!(f, "error: {}", message),
            TaskStatus::Skipped { reason } => write!(f, "skipped ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcome {
    #[serde(flatten)]
    pub status: TaskStatus,
    #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// What happened during a run, keyed by task id in plan order
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub trigger: PlanTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: IndexMap<String, TaskOutcome>,
}

impl RunReport {
    /// True when every planned task succeeded
    pub fn success(&self) -> bool {
        self.outcomes.values().all(|o| o.status.is_success())
    }

    pub fn status(&self, id: &str) -> Option<&TaskStatus> {
        self.outcomes.get(id).map(|o| &o.status)
    }

    /// Ids of tasks that ran and did not succeed
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| {
                !matches!(o.status, TaskStatus::Succeeded | TaskStatus::Skipped { .. })
            })
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o.status, TaskStatus::Skipped { .. }))
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Executes plans with a pluggable executor
pub struct Runner {
    executor: Arc<dyn TaskExecutor>,
    options: RunnerOptions,
}

impl Runner {
    pub fn new(executor: Arc<dyn TaskExecutor>, options: RunnerOptions) -> Self {
        Self { executor, options }
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    fn exec_context(
        &self,
        workspace: &Workspace,
        progress: Option<mpsc::UnboundedSender<String>>,
    ) -> ExecContext {
        let mut env = self.options.env.clone();
        if let Some(container_env) = workspace.descriptor().and_then(|d| d.container_env.as_ref()) {
            env.extend(container_env.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        ExecContext {
            workdir: workspace.root().to_path_buf(),
            shell: self.options.shell.clone(),
            env,
            timeout: self.options.timeout,
            progress,
        }
    }

    /// Run every step of `plan`
    pub async fn run(
        &self,
        workspace: &Workspace,
        plan: &ExecutionPlan,
        progress: Option<mpsc::UnboundedSender<String>>,
    ) -> Result<RunReport> {
        let manifest = workspace.require_manifest()?;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let ctx = self.exec_context(workspace, progress.clone());
        let progress = progress.as_ref();

        tracing::info!(
            "Run {} ({}): {} task(s) planned",
            run_id,
            plan.trigger,
            plan.len()
        );

        let n = plan.steps.len();
        let position: HashMap<&str, usize> = plan
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.as_str(), i))
            .collect();

        // Dependency bookkeeping restricted to the plan
        let mut remaining = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, step) in plan.steps.iter().enumerate() {
            for dep in &step.depends_on {
                let j = *position
                    .get(dep.as_str())
                    .ok_or_else(|| CoreError::TaskNotFound(dep.clone()))?;
                remaining[i] += 1;
                dependents[j].push(i);
            }
        }

        let mut specs = Vec::with_capacity(n);
        for step in &plan.steps {
            let spec = manifest
                .task(&step.id)
                .cloned()
                .ok_or_else(|| CoreError::TaskNotFound(step.id.clone()))?;
            specs.push(spec);
        }

        let mut outcomes: Vec<Option<TaskOutcome>> = vec![None; n];
        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| remaining[i] == 0).collect();
        let mut in_flight = FuturesUnordered::new();
        let mut halted = false;

        loop {
            while !halted && in_flight.len() < self.options.max_parallel {
                let Some(idx) = ready.pop_first() else {
                    break;
                };
                let id = plan.steps[idx].id.as_str();
                let spec = &specs[idx];

                tracing::info!("Starting task '{}'", id);
                send_progress(
                    progress,
                    &format!("Running task '{}' ({})...", id, spec.display_name(id)),
                );

                // Executions stay owned by this future: dropping the run drops
                // (and kills) every in-flight command.
                let executor = &self.executor;
                let ctx = &ctx;
                in_flight.push(async move { (idx, executor.execute(id, spec, ctx).await) });
            }

            let Some((idx, result)) = in_flight.next().await else {
                break;
            };
            let id = plan.steps[idx].id.as_str();
            let outcome = outcome_from(result);

            match &outcome.status {
                TaskStatus::Succeeded => {
                    tracing::info!("Task '{}' succeeded in {:?}", id, outcome.duration);
                    send_progress(progress, &format!("Task '{}' succeeded", id));
                    for &d in &dependents[idx] {
                        remaining[d] -= 1;
                        if remaining[d] == 0 && outcomes[d].is_none() {
                            ready.insert(d);
                        }
                    }
                }
                status => {
                    tracing::warn!("Task '{}' {}", id, status);
                    send_progress(progress, &format!("Task '{}' {}", id, status));
                    skip_dependents(idx, &dependents, plan, &mut outcomes, progress);
                    if self.options.fail_fast {
                        halted = true;
                    }
                }
            }
            outcomes[idx] = Some(outcome);
        }

        let mut report_outcomes = IndexMap::with_capacity(n);
        for (i, step) in plan.steps.iter().enumerate() {
            let outcome = outcomes[i].take().unwrap_or_else(|| TaskOutcome {
                status: TaskStatus::Skipped {
                    reason: "run stopped after an earlier failure".to_string(),
                },
                duration: Duration::ZERO,
            });
            report_outcomes.insert(step.id.clone(), outcome);
        }

        let report = RunReport {
            run_id,
            trigger: plan.trigger.clone(),
            started_at,
            finished_at: Utc::now(),
            outcomes: report_outcomes,
        };
        tracing::info!(
            "Run {} finished: {} failed, {} skipped",
            run_id,
            report.failed().len(),
            report.skipped().len()
        );
        Ok(report)
    }
}

fn outcome_from(result: Result<ExecResult>) -> TaskOutcome {
    match result {
        Ok(r) if r.timed_out => TaskOutcome {
            status: TaskStatus::TimedOut,
            duration: r.duration,
        },
        Ok(r) if r.exit_code == 0 => TaskOutcome {
            status: TaskStatus::Succeeded,
            duration: r.duration,
        },
        Ok(r) => TaskOutcome {
            status: TaskStatus::Failed {
                exit_code: r.exit_code,
            },
            duration: r.duration,
        },
        Err(e) => TaskOutcome {
            status: TaskStatus::Error {
                message: e.to_string(),
            },
            duration: Duration::ZERO,
        },
    }
}

/// Mark every transitive dependent of `failed` as skipped
fn skip_dependents(
    failed: usize,
    dependents: &[Vec<usize>],
    plan: &ExecutionPlan,
    outcomes: &mut [Option<TaskOutcome>],
    progress: Option<&mpsc::UnboundedSender<String>>,
) {
    let failed_id = &plan.steps[failed].id;
    let mut stack: Vec<usize> = dependents[failed].clone();
    while let Some(i) = stack.pop() {
        if outcomes[i].is_some() {
            continue;
        }
        let id = &plan.steps[i].id;
        tracing::info!("Skipping task '{}' because '{}' did not succeed", id, failed_id);
        send_progress(progress, &format!("Skipping task '{}'", id));
        outcomes[i] = Some(TaskOutcome {
            status: TaskStatus::Skipped {
                reason: format!("dependency '{}' did not succeed", failed_id),
            },
            duration: Duration::ZERO,
        });
        stack.extend(dependents[i].iter().copied());
    }
}
