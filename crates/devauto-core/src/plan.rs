//! Execution planning: which tasks run for a trigger, and in what order

use crate::{Result, TaskGraph};
use devauto_config::{AutomationManifest, Trigger};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// What started the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "tasks", rename_all = "camelCase")]
pub enum PlanTrigger {
    /// Container became ready: run every `postDevcontainerStart` task
    Start,
    /// Explicit invocation of the named tasks
    Manual(Vec<String>),
}

impl fmt::Display for PlanTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanTrigger::Start => write!(f, "{}", Trigger::PostDevcontainerStart),
            PlanTrigger::Manual(ids) => write!(f, "manual ({})", ids.join(", ")),
        }
    }
}

/// Why a task is part of the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StepReason {
    /// Carries the trigger being run
    Triggered,
    /// Named explicitly by the user
    Requested,
    /// Pulled in through `dependsOn`
    Dependency,
}

impl fmt::Display for StepReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepReason::Triggered => write!(f, "triggered"),
            StepReason::Requested => write!(f, "requested"),
            StepReason::Dependency => write!(f, "dependency"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    pub id: String,
    pub reason: StepReason,
    /// Direct dependencies that are also in the plan
    pub depends_on: Vec<String>,
}

/// Ordered set of tasks to run. Every step comes after its dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    pub trigger: PlanTrigger,
    pub steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    /// Plan a run for the given trigger
    pub fn build(manifest: &AutomationManifest, trigger: PlanTrigger) -> Result<Self> {
        let graph = TaskGraph::build(manifest)?;
        Self::with_graph(manifest, &graph, trigger)
    }

    /// Plan a run using an already-built graph
    pub fn with_graph(
        manifest: &AutomationManifest,
        graph: &TaskGraph,
        trigger: PlanTrigger,
    ) -> Result<Self> {
        let (roots, root_reason): (Vec<String>, StepReason) = match &trigger {
            PlanTrigger::Start => (
                manifest
                    .tasks_triggered_by(&Trigger::PostDevcontainerStart)
                    .map(str::to_string)
                    .collect(),
                StepReason::Triggered,
            ),
            PlanTrigger::Manual(ids) => {
                for id in ids {
                    if !graph.contains(id) {
                        return Err(crate::CoreError::TaskNotFound(id.clone()));
                    }
                    if let Some(task) = manifest.task(id) {
                        if !task.has_trigger(&Trigger::Manual) {
                            tracing::debug!("Task '{}' has no manual trigger; running on request", id);
                        }
                    }
                }
                (ids.clone(), StepReason::Requested)
            }
        };

        let root_set: HashSet<&str> = roots.iter().map(String::as_str).collect();
        let selected = graph.closure(&roots)?;
        let selected_set: HashSet<&str> = selected.iter().copied().collect();

        let mut steps = Vec::with_capacity(selected.len());
        for id in selected {
            let depends_on = graph
                .dependencies(id)?
                .into_iter()
                .filter(|d| selected_set.contains(d))
                .map(str::to_string)
                .collect();
            let reason = if root_set.contains(id) {
                root_reason
            } else {
                StepReason::Dependency
            };
            steps.push(PlanStep {
                id: id.to_string(),
                reason,
                depends_on,
            });
        }

        tracing::debug!("Planned {} step(s) for {}", steps.len(), trigger);
        Ok(Self { trigger, steps })
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn task_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }
}
