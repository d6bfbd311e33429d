//! Test execution engine
//!
//! Runs a routine once per record, sequentially or concurrently, with
//! per-case retries, timeouts, hooks and lifecycle notifications.

mod events;
mod options;
mod parallel;
mod routine;
mod runner;

pub use events::{EventBus, EventKind, ExecutionEvent, Observer};
pub use options::{ExecutionMode, ExecutionOptions, DEFAULT_RUN_NAME};
pub use routine::{CaseContext, CaseHook, TestRoutine};
pub use runner::TestExecutor;
