//! Execution options

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::routine::CaseHook;
use crate::config::EngineConfig;

pub const DEFAULT_RUN_NAME: &str = "data-driven test";

/// How the records of a run are scheduled
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Concurrent,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Sequential => write!(f, "sequential"),
            ExecutionMode::Concurrent => write!(f, "concurrent"),
        }
    }
}

/// Per-invocation options for [`TestExecutor::execute`](super::TestExecutor::execute)
#[derive(Clone)]
pub struct ExecutionOptions {
    /// Run name, also used as the name of every case
    pub name: String,
    /// Run exactly this record instead of all of them
    pub index: Option<usize>,
    pub mode: ExecutionMode,
    pub max_retries: u32,
    pub timeout: Duration,
    /// Cap on in-flight cases in concurrent mode; `None` is unbounded
    pub max_concurrency: Option<usize>,
    pub before_each: Option<Arc<dyn CaseHook>>,
    pub after_each: Option<Arc<dyn CaseHook>>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_RUN_NAME.to_string(),
            index: None,
            mode: ExecutionMode::Sequential,
            max_retries: 0,
            timeout: Duration::from_secs(30),
            max_concurrency: None,
            before_each: None,
            after_each: None,
        }
    }
}

impl ExecutionOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Seed retry, timeout and scheduling settings from engine configuration
    pub fn from_config(name: impl Into<String>, config: &EngineConfig) -> Self {
        let mode = if config.concurrent {
            ExecutionMode::Concurrent
        } else {
            ExecutionMode::Sequential
        };

        Self {
            mode,
            max_retries: config.max_retries,
            timeout: Duration::from_millis(config.timeout_ms),
            max_concurrency: config.max_concurrency,
            ..Self::new(name)
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn concurrent(mut self) -> Self {
        self.mode = ExecutionMode::Concurrent;
        self
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Setup hook, run once per case before the first attempt.
    ///
    /// A failing setup fails the case immediately with `attempts = 1`; it
    /// is not retried whatever `max_retries` says.
    pub fn before_each(mut self, hook: impl CaseHook + 'static) -> Self {
        self.before_each = Some(Arc::new(hook));
        self
    }

    /// Teardown hook, run after every attempt whose body passed. A failing
    /// teardown fails that attempt, which is then retried within the budget.
    pub fn after_each(mut self, hook: impl CaseHook + 'static) -> Self {
        self.after_each = Some(Arc::new(hook));
        self
    }

    /// Attempts per case: the first try plus every retry
    pub fn attempt_budget(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl fmt::Debug for ExecutionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionOptions")
            .field("name", &self.name)
            .field("index", &self.index)
            .field("mode", &self.mode)
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .field("max_concurrency", &self.max_concurrency)
            .field("before_each", &self.before_each.is_some())
            .field("after_each", &self.after_each.is_some())
            .finish()
    }
}
