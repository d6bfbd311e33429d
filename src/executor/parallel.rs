//! Concurrent case execution
//!
//! One task per record, joined together; results keep record order.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::events::EventBus;
use super::options::ExecutionOptions;
use super::routine::TestRoutine;
use super::runner::{join_failure, run_case};
use crate::models::{DataRecord, TestCaseResult};

pub(crate) async fn run_concurrent(
    routine: Arc<dyn TestRoutine>,
    records: &[DataRecord],
    options: &ExecutionOptions,
    events: &EventBus,
) -> Vec<TestCaseResult> {
    let limiter = options
        .max_concurrency
        .map(|limit| Arc::new(Semaphore::new(limit.max(1))));

    info!(
        "Launching {} concurrent case(s) (max {})",
        records.len(),
        options
            .max_concurrency
            .map_or_else(|| "unbounded".to_string(), |n| n.to_string())
    );

    let mut handles = Vec::with_capacity(records.len());

    for (index, record) in records.iter().cloned().enumerate() {
        let routine = routine.clone();
        let options = options.clone();
        let events = events.clone();
        let limiter = limiter.clone();

        let handle = tokio::spawn(async move {
            // the semaphore is never closed, so acquisition cannot fail
            let _permit = match limiter {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };

            debug!("Starting concurrent case {} [{}]", options.name, index);
            run_case(routine, record, index, &options, &events).await
        });

        handles.push(handle);
    }

    join_all(handles)
        .await
        .into_iter()
        .zip(records)
        .enumerate()
        .map(|(index, (joined, record))| {
            joined.unwrap_or_else(|e| {
                TestCaseResult::fail(&options.name, index, record.clone(), 0, join_failure(e))
            })
        })
        .collect()
}
