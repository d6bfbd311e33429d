//! Data-driven test execution engine
//!
//! Runs a caller-supplied test routine once per record of a dataset, with
//! per-case retries, timeouts, setup/teardown hooks, sequential or
//! concurrent scheduling, and aggregation into run summaries.
//!
//! ## Components
//!
//! - [`DataProvider`]: loads records through a [`DataSource`] and exposes
//!   read-only views over them
//! - [`DataManager`]: isolated per-test data entries, clones, generated
//!   datasets and scheduled cleanup
//! - [`TestExecutor`]: drives a [`TestRoutine`] over a provider and keeps
//!   the run history
//! - [`report`]: renders the run history as JSON, tables, CSV, Markdown or
//!   JUnit XML
//!
//! ## Example
//!
//! ```no_run
//! use ddt_runner::{
//!     CaseContext, DataProvider, DataRecord, ExecutionOptions, FileSource, TestExecutor,
//! };
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let mut provider = DataProvider::new(FileSource::new());
//! provider.load("users.csv").await?;
//!
//! let executor = TestExecutor::new();
//! let summary = executor
//!     .execute(
//!         |record: DataRecord, _index: usize, _ctx: CaseContext| async move {
//!             anyhow::ensure!(record.field_equals("expected", "ok"), "unexpected result");
//!             Ok(())
//!         },
//!         &provider,
//!         ExecutionOptions::new("login").with_retries(1),
//!     )
//!     .await?;
//!
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod manager;
pub mod models;
pub mod provider;
pub mod report;
pub mod utils;

pub use config::{EngineConfig, EnvConfig};
pub use error::{EngineError, EngineResult};
pub use executor::{
    CaseContext, CaseHook, EventBus, EventKind, ExecutionEvent, ExecutionMode, ExecutionOptions,
    TestExecutor, TestRoutine,
};
pub use manager::{CloneModifications, CreateOptions, DataManager, DataStats};
pub use models::{DataRecord, TestCaseResult, TestRunSummary};
pub use provider::{DataProvider, DataSource, FileSource, InlineSource, LoadedData};
pub use report::{FileSink, HistoryStats, MemorySink, ReportFormat, ReportRenderer, ReportSink};
