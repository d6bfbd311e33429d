//! Test execution runner
//!
//! Drives a routine over the records of a loaded provider, one case per
//! record, and keeps the history of finished runs.

use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::events::{EventBus, EventKind, ExecutionEvent};
use super::options::{ExecutionMode, ExecutionOptions};
use super::parallel::run_concurrent;
use super::routine::{CaseContext, TestRoutine};
use crate::error::{EngineError, EngineResult};
use crate::models::{DataRecord, TestCaseResult, TestRunSummary};
use crate::provider::DataProvider;
use crate::report::{ReportFormat, ReportRenderer, ReportSink};
use crate::utils::timer::Timer;

/// Data-driven test executor
///
/// Cloning yields a handle onto the same observers and run history.
#[derive(Clone, Default)]
pub struct TestExecutor {
    events: EventBus,
    history: Arc<Mutex<Vec<TestRunSummary>>>,
}

impl TestExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured event bus, e.g. one without observer isolation
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Register an observer for one lifecycle event
    pub fn on<F>(&self, kind: EventKind, observer: F)
    where
        F: Fn(&ExecutionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.events.on(kind, observer);
    }

    /// Run `routine` against the provider's records.
    ///
    /// Fails only on precondition violations; case failures end up inside
    /// the returned summary.
    pub async fn execute<R>(
        &self,
        routine: R,
        provider: &DataProvider,
        options: ExecutionOptions,
    ) -> EngineResult<TestRunSummary>
    where
        R: TestRoutine + 'static,
    {
        let records = provider.all_data()?;
        let routine: Arc<dyn TestRoutine> = Arc::new(routine);
        let timer = Timer::start(format!("run {}", options.name));

        let results = match options.index {
            Some(index) => {
                let record = provider
                    .data_by_index(index)?
                    .cloned()
                    .ok_or_else(|| EngineError::UnknownIdentifier(format!("index {index}")))?;

                info!("Running case {} of {}", index, options.name);
                vec![run_case(routine, record, index, &options, &self.events).await]
            }
            None => {
                info!(
                    "Running {} case(s) of {} ({})",
                    records.len(),
                    options.name,
                    options.mode
                );
                match options.mode {
                    ExecutionMode::Sequential => {
                        run_sequential(routine, records, &options, &self.events).await
                    }
                    ExecutionMode::Concurrent => {
                        run_concurrent(routine, records, &options, &self.events).await
                    }
                }
            }
        };

        let summary = Self::summarize_results(&options.name, results);

        info!(
            "Run completed in {}ms - Pass: {}/{} ({:.1}%)",
            timer.stop().as_millis(),
            summary.passed,
            summary.total,
            summary.success_rate
        );

        self.history.lock().push(summary.clone());
        Ok(summary)
    }

    /// Aggregate case results into a run summary
    pub fn summarize_results(name: &str, results: Vec<TestCaseResult>) -> TestRunSummary {
        TestRunSummary::new(name, results)
    }

    /// Every summary produced so far, oldest first
    pub fn get_results(&self) -> Vec<TestRunSummary> {
        self.history.lock().clone()
    }

    pub fn last_summary(&self) -> Option<TestRunSummary> {
        self.history.lock().last().cloned()
    }

    pub fn clear_results(&self) {
        self.history.lock().clear();
    }

    /// Render the run history without touching it
    pub fn render_report(&self, format: ReportFormat) -> EngineResult<String> {
        let history = self.history.lock();
        ReportRenderer::new(&history).render(format)
    }

    /// Render the run history and hand it to `sink` under `destination`.
    ///
    /// Returns the location reported by the sink.
    pub fn save_report(
        &self,
        format: ReportFormat,
        sink: &dyn ReportSink,
        destination: &str,
    ) -> EngineResult<String> {
        let rendered = self.render_report(format)?;
        let location = sink.persist(&rendered, destination, format)?;
        info!("Report saved to {}", location);
        Ok(location)
    }
}

async fn run_sequential(
    routine: Arc<dyn TestRoutine>,
    records: &[DataRecord],
    options: &ExecutionOptions,
    events: &EventBus,
) -> Vec<TestCaseResult> {
    let mut results = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        let result = run_case(routine.clone(), record.clone(), index, options, events).await;
        info!("  {}", result);
        results.push(result);
    }

    results
}

/// One case: start event, then attempts until success or the budget runs out
pub(crate) async fn run_case(
    routine: Arc<dyn TestRoutine>,
    record: DataRecord,
    index: usize,
    options: &ExecutionOptions,
    events: &EventBus,
) -> TestCaseResult {
    let timer = Timer::start(format!("{} [{}]", options.name, index));
    let mut result = TestCaseResult::pending(&options.name, index, record.clone());

    events.emit(&ExecutionEvent::CaseStarted {
        name: options.name.clone(),
        index,
        record: record.clone(),
    });

    // setup runs once; a broken setup is not retried
    if let Some(hook) = &options.before_each {
        if let Err(e) = hook.invoke(record.clone()).await {
            let message =
                EngineError::CaseFailure(format!("beforeEach hook failed: {e:#}")).to_string();
            result.attempts = 1;
            return finish_failed(result, message, timer, events);
        }
    }

    let budget = options.attempt_budget();
    let mut last_error = String::new();

    for attempt in 1..=budget {
        result.attempts = attempt;
        debug!("Case {} [{}] attempt {}/{}", options.name, index, attempt, budget);

        match run_attempt(&routine, &record, index, attempt, options).await {
            Ok(()) => {
                result.passed = true;
                result.error = None;
                events.emit(&ExecutionEvent::CaseSucceeded {
                    name: options.name.clone(),
                    index,
                    attempt,
                    duration_ms: timer.elapsed_ms(),
                });
                result.duration_ms = timer.stop().as_millis() as u64;
                return result;
            }
            Err(e) => {
                last_error = e.to_string();
                debug!(
                    "Case {} [{}] attempt {} failed: {}",
                    options.name, index, attempt, last_error
                );
                events.emit(&ExecutionEvent::CaseFailed {
                    name: options.name.clone(),
                    index,
                    attempt,
                    error: last_error.clone(),
                    final_attempt: attempt == budget,
                });
            }
        }
    }

    result.error = Some(last_error);
    result.duration_ms = timer.stop().as_millis() as u64;
    error!(
        "Case {} [{}] failed after {} attempt(s): {}",
        result.name,
        index,
        result.attempts,
        result.error.as_deref().unwrap_or_default()
    );
    result
}

fn finish_failed(
    mut result: TestCaseResult,
    message: String,
    timer: Timer,
    events: &EventBus,
) -> TestCaseResult {
    events.emit(&ExecutionEvent::CaseFailed {
        name: result.name.clone(),
        index: result.index,
        attempt: result.attempts,
        error: message.clone(),
        final_attempt: true,
    });
    error!("Case {} [{}] failed: {}", result.name, result.index, message);

    result.error = Some(message);
    result.duration_ms = timer.stop().as_millis() as u64;
    result
}

/// Body raced against the timeout, then teardown
async fn run_attempt(
    routine: &Arc<dyn TestRoutine>,
    record: &DataRecord,
    index: usize,
    attempt: u32,
    options: &ExecutionOptions,
) -> EngineResult<()> {
    let token = CancellationToken::new();
    let ctx = CaseContext::new(&options.name, index, attempt, token.clone());

    let mut task = {
        let routine = Arc::clone(routine);
        let record = record.clone();
        tokio::spawn(async move { routine.run(record, index, ctx).await })
    };

    match tokio::time::timeout(options.timeout, &mut task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => return Err(EngineError::CaseFailure(format!("{e:#}"))),
        Ok(Err(e)) => return Err(EngineError::CaseFailure(join_failure(e))),
        Err(_) => {
            token.cancel();
            task.abort();
            return Err(EngineError::CaseTimeout(options.timeout.as_millis() as u64));
        }
    }

    if let Some(hook) = &options.after_each {
        hook.invoke(record.clone())
            .await
            .map_err(|e| EngineError::CaseFailure(format!("afterEach hook failed: {e:#}")))?;
    }

    Ok(())
}

pub(crate) fn join_failure(e: JoinError) -> String {
    if e.is_panic() {
        format!("panicked: {}", panic_message(e.into_panic()))
    } else {
        "task was cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InlineSource;
    use crate::report::MemorySink;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    async fn provider(records: Vec<DataRecord>) -> DataProvider {
        let mut provider = DataProvider::new(InlineSource::new().with_records("data", records));
        provider.load("data").await.unwrap();
        provider
    }

    fn users(n: usize) -> Vec<DataRecord> {
        (0..n)
            .map(|i| DataRecord::new().with("user", format!("u{i}")).with("expected", "ok"))
            .collect()
    }

    fn check_expected(
        record: DataRecord,
        _index: usize,
        _ctx: CaseContext,
    ) -> impl std::future::Future<Output = anyhow::Result<()>> + Send + 'static {
        async move {
            anyhow::ensure!(record.field_equals("expected", "ok"), "unexpected outcome");
            Ok(())
        }
    }

    fn always_fail(
        _record: DataRecord,
        _index: usize,
        _ctx: CaseContext,
    ) -> impl std::future::Future<Output = anyhow::Result<()>> + Send + 'static {
        async { anyhow::bail!("nope") }
    }

    fn missing_fixture(
        _record: DataRecord,
    ) -> impl std::future::Future<Output = anyhow::Result<()>> + Send + 'static {
        async { anyhow::bail!("no fixture") }
    }

    #[tokio::test]
    async fn test_unloaded_provider_fails_fast() {
        let executor = TestExecutor::new();
        let provider = DataProvider::new(InlineSource::new());

        let err = executor
            .execute(check_expected, &provider, ExecutionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ProviderNotLoaded));
        assert!(executor.get_results().is_empty());
    }

    #[tokio::test]
    async fn test_sequential_run() {
        let executor = TestExecutor::new();
        let mut records = users(3);
        records[1].insert("expected", "fail");
        let provider = provider(records).await;

        let summary = executor
            .execute(check_expected, &provider, ExecutionOptions::new("login"))
            .await
            .unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        let failed = &summary.results[1];
        assert_eq!(failed.error.as_deref(), Some("Test failed: unexpected outcome"));
        assert_eq!(executor.get_results().len(), 1);
    }

    #[tokio::test]
    async fn test_single_index() {
        let executor = TestExecutor::new();
        let provider = provider(users(4)).await;

        let summary = executor
            .execute(check_expected, &provider, ExecutionOptions::default().with_index(2))
            .await
            .unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.results[0].index, 2);

        let err = executor
            .execute(check_expected, &provider, ExecutionOptions::default().with_index(9))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownIdentifier(_)));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let executor = TestExecutor::new();
        let provider = provider(users(1)).await;
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let flaky = move |_record: DataRecord, _index: usize, ctx: CaseContext| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                anyhow::ensure!(ctx.attempt >= 3, "attempt {} failed", ctx.attempt);
                Ok(())
            }
        };

        let summary = executor
            .execute(flaky, &provider, ExecutionOptions::default().with_retries(5))
            .await
            .unwrap();

        assert_eq!(summary.passed, 1);
        assert_eq!(summary.results[0].attempts, 3);
        assert!(summary.results[0].error.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_cancels_context() {
        let executor = TestExecutor::new();
        let provider = provider(users(1)).await;
        let observed = Arc::new(AtomicU32::new(0));

        let flag = observed.clone();
        let slow = move |_record: DataRecord, _index: usize, ctx: CaseContext| {
            let flag = flag.clone();
            async move {
                let token = ctx.token().clone();
                tokio::spawn(async move {
                    token.cancelled().await;
                    flag.store(1, Ordering::SeqCst);
                });
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(())
            }
        };

        let options = ExecutionOptions::default().with_timeout(Duration::from_millis(30));
        let summary = executor.execute(slow, &provider, options).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(
            summary.results[0].error.as_deref(),
            Some("Test timed out after 30ms")
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_routine_is_a_failure() {
        let executor = TestExecutor::new();
        let provider = provider(users(2)).await;

        let panicky = |_record: DataRecord, index: usize, _ctx: CaseContext| async move {
            if index == 0 {
                panic!("routine exploded");
            }
            anyhow::Ok(())
        };

        let summary = executor
            .execute(panicky, &provider, ExecutionOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.passed, 1);
        let error = summary.results[0].error.as_deref().unwrap();
        assert!(error.contains("routine exploded"));
    }

    #[tokio::test]
    async fn test_hooks() {
        let executor = TestExecutor::new();
        let provider = provider(users(1)).await;
        let setups = Arc::new(AtomicU32::new(0));
        let teardowns = Arc::new(AtomicU32::new(0));

        let (s, t) = (setups.clone(), teardowns.clone());
        let options = ExecutionOptions::default()
            .with_retries(2)
            .before_each(move |_record: DataRecord| {
                s.fetch_add(1, Ordering::SeqCst);
                async { anyhow::Ok(()) }
            })
            .after_each(move |_record: DataRecord| {
                t.fetch_add(1, Ordering::SeqCst);
                async { anyhow::Ok(()) }
            });

        let summary = executor.execute(always_fail, &provider, options).await.unwrap();
        assert_eq!(summary.results[0].attempts, 3);
        assert_eq!(setups.load(Ordering::SeqCst), 1);
        assert_eq!(teardowns.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_teardown_runs_after_passing_body() {
        let executor = TestExecutor::new();
        let provider = provider(users(1)).await;
        let setups = Arc::new(AtomicU32::new(0));
        let teardowns = Arc::new(AtomicU32::new(0));

        let (s, t) = (setups.clone(), teardowns.clone());
        let options = ExecutionOptions::default()
            .with_retries(2)
            .before_each(move |_record: DataRecord| {
                s.fetch_add(1, Ordering::SeqCst);
                async { anyhow::Ok(()) }
            })
            .after_each(move |_record: DataRecord| {
                t.fetch_add(1, Ordering::SeqCst);
                async { anyhow::Ok(()) }
            });

        let summary = executor.execute(check_expected, &provider, options).await.unwrap();
        assert!(summary.results[0].passed);
        assert_eq!(summary.results[0].attempts, 1);
        assert_eq!(setups.load(Ordering::SeqCst), 1);
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_teardown_consumes_attempt() {
        let executor = TestExecutor::new();
        let provider = provider(users(1)).await;
        let teardowns = Arc::new(AtomicU32::new(0));

        let t = teardowns.clone();
        let options = ExecutionOptions::default()
            .with_retries(2)
            .after_each(move |_record: DataRecord| {
                let call = t.fetch_add(1, Ordering::SeqCst);
                async move {
                    anyhow::ensure!(call > 0, "teardown not ready");
                    Ok(())
                }
            });

        let summary = executor.execute(check_expected, &provider, options).await.unwrap();
        let result = &summary.results[0];
        assert!(result.passed);
        assert_eq!(result.attempts, 2);
        assert!(result.error.is_none());
        assert_eq!(teardowns.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failing_teardown_exhausts_budget() {
        let executor = TestExecutor::new();
        let provider = provider(users(1)).await;

        let options = ExecutionOptions::default()
            .with_retries(1)
            .after_each(missing_fixture);

        let summary = executor.execute(check_expected, &provider, options).await.unwrap();
        let result = &summary.results[0];
        assert!(!result.passed);
        assert_eq!(result.attempts, 2);
        assert_eq!(
            result.error.as_deref(),
            Some("Test failed: afterEach hook failed: no fixture")
        );
    }

    #[tokio::test]
    async fn test_failing_setup_fails_case() {
        let executor = TestExecutor::new();
        let provider = provider(users(1)).await;

        let options = ExecutionOptions::default()
            .with_retries(3)
            .before_each(missing_fixture);

        let summary = executor.execute(check_expected, &provider, options).await.unwrap();
        let result = &summary.results[0];
        assert!(!result.passed);
        assert_eq!(result.attempts, 1);
        assert!(result.error.as_deref().unwrap().contains("no fixture"));
    }

    #[tokio::test]
    async fn test_events_per_attempt() {
        let executor = TestExecutor::new();
        let provider = provider(users(2)).await;
        let seen = Arc::new(Mutex::new(Vec::new()));

        for kind in [EventKind::Start, EventKind::Success, EventKind::Failure] {
            let seen = seen.clone();
            executor.on(kind, move |event| {
                seen.lock().push((event.kind(), event.index()));
                Ok(())
            });
        }

        executor
            .execute(always_fail, &provider, ExecutionOptions::default().with_retries(1))
            .await
            .unwrap();

        let seen = seen.lock();
        assert_eq!(
            *seen,
            vec![
                (EventKind::Start, 0),
                (EventKind::Failure, 0),
                (EventKind::Failure, 0),
                (EventKind::Start, 1),
                (EventKind::Failure, 1),
                (EventKind::Failure, 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_history_and_reports() {
        let executor = TestExecutor::new();
        let provider = provider(users(2)).await;

        executor
            .execute(check_expected, &provider, ExecutionOptions::new("first"))
            .await
            .unwrap();
        executor
            .execute(check_expected, &provider, ExecutionOptions::new("second"))
            .await
            .unwrap();

        assert_eq!(executor.get_results().len(), 2);
        assert_eq!(executor.last_summary().unwrap().name, "second");

        let sink = MemorySink::new();
        let location = executor
            .save_report(ReportFormat::Json, &sink, "runs")
            .unwrap();
        assert_eq!(location, "memory://runs.json");
        assert!(sink.get("runs").unwrap().contains("\"second\""));

        executor.clear_results();
        assert!(executor.get_results().is_empty());
        assert!(executor.last_summary().is_none());
    }

    #[test]
    fn test_summarize_empty() {
        let summary = TestExecutor::summarize_results("nothing", Vec::new());
        assert_eq!(summary.name, "nothing");
        assert_eq!(summary.success_rate, 0.0);
    }
}
