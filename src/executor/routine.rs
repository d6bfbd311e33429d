//! Test routine and hook collaborators

use async_trait::async_trait;
use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::models::DataRecord;

/// Per-attempt context handed to the routine
#[derive(Clone, Debug)]
pub struct CaseContext {
    pub run_name: String,
    pub index: usize,
    pub attempt: u32,
    cancel: CancellationToken,
}

impl CaseContext {
    pub(crate) fn new(
        run_name: &str,
        index: usize,
        attempt: u32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            run_name: run_name.to_string(),
            index,
            attempt,
            cancel,
        }
    }

    /// Set once the attempt has timed out and its result will be discarded
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes when the attempt is cancelled; use in `tokio::select!`
    /// around long-running steps.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// The test body run once per record
#[async_trait]
pub trait TestRoutine: Send + Sync {
    async fn run(&self, record: DataRecord, index: usize, ctx: CaseContext) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> TestRoutine for F
where
    F: Fn(DataRecord, usize, CaseContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self, record: DataRecord, index: usize, ctx: CaseContext) -> anyhow::Result<()> {
        (self)(record, index, ctx).await
    }
}

/// Setup or teardown run around the test body
#[async_trait]
pub trait CaseHook: Send + Sync {
    async fn invoke(&self, record: DataRecord) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> CaseHook for F
where
    F: Fn(DataRecord) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn invoke(&self, record: DataRecord) -> anyhow::Result<()> {
        (self)(record).await
    }
}
