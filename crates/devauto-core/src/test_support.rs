//! Test support utilities for devauto-core
//!
//! Provides a MockExecutor for exercising the runner without spawning
//! real processes.

use crate::{CoreError, ExecContext, ExecResult, Result, TaskExecutor};
use async_trait::async_trait;
use devauto_config::TaskSpec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Configurable mock executor that records calls
#[derive(Default)]
pub struct MockExecutor {
    calls: Arc<Mutex<Vec<String>>>,
    envs: Arc<Mutex<Vec<HashMap<String, String>>>>,
    exit_codes: HashMap<String, i64>,
    errors: HashMap<String, String>,
    timeouts: Vec<String>,
    delay: Option<Duration>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl MockExecutor {
    /// Every task succeeds immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `id` exit with `code`
    pub fn with_exit_code(mut self, id: &str, code: i64) -> Self {
        self.exit_codes.insert(id.to_string(), code);
        self
    }

    /// Make `id` fail to start with `message`
    pub fn with_error(mut self, id: &str, message: &str) -> Self {
        self.errors.insert(id.to_string(), message.to_string());
        self
    }

    /// Make `id` report a timeout
    pub fn with_timeout(mut self, id: &str) -> Self {
        self.timeouts.push(id.to_string());
        self
    }

    /// Sleep this long inside every execution
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Task ids in the order execution started
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Environment passed to the most recent execution
    pub fn last_env(&self) -> Option<HashMap<String, String>> {
        self.envs.lock().unwrap().last().cloned()
    }

    /// Highest number of executions observed running at once
    pub fn max_concurrent(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskExecutor for MockExecutor {
    async fn execute(&self, id: &str, _task: &TaskSpec, ctx: &ExecContext) -> Result<ExecResult> {
        self.calls.lock().unwrap().push(id.to_string());
        self.envs.lock().unwrap().push(ctx.env.clone());

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        if let Some(message) = self.errors.get(id) {
            return Err(CoreError::ExecFailed(message.clone()));
        }
        Ok(ExecResult {
            exit_code: if self.timeouts.iter().any(|t| t == id) {
                -1
            } else {
                self.exit_codes.get(id).copied().unwrap_or(0)
            },
            timed_out: self.timeouts.iter().any(|t| t == id),
            duration: self.delay.unwrap_or_default(),
        })
    }
}
