//! Lifecycle notifications
//!
//! Observers are registered per event kind and run synchronously, in
//! registration order, on the task that emits the event.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

use crate::models::DataRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    Success,
    Failure,
}

#[derive(Clone, Debug)]
pub enum ExecutionEvent {
    /// Emitted once per case, before its first attempt
    CaseStarted {
        name: String,
        index: usize,
        record: DataRecord,
    },
    CaseSucceeded {
        name: String,
        index: usize,
        attempt: u32,
        duration_ms: u64,
    },
    /// Emitted for every failed attempt
    CaseFailed {
        name: String,
        index: usize,
        attempt: u32,
        error: String,
        final_attempt: bool,
    },
}

impl ExecutionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ExecutionEvent::CaseStarted { .. } => EventKind::Start,
            ExecutionEvent::CaseSucceeded { .. } => EventKind::Success,
            ExecutionEvent::CaseFailed { .. } => EventKind::Failure,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            ExecutionEvent::CaseStarted { index, .. }
            | ExecutionEvent::CaseSucceeded { index, .. }
            | ExecutionEvent::CaseFailed { index, .. } => *index,
        }
    }
}

pub type Observer = Arc<dyn Fn(&ExecutionEvent) -> anyhow::Result<()> + Send + Sync>;

/// Per-kind observer registry
#[derive(Clone)]
pub struct EventBus {
    observers: Arc<RwLock<HashMap<EventKind, Vec<Observer>>>>,
    isolate: bool,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            observers: Arc::new(RwLock::new(HashMap::new())),
            isolate: true,
        }
    }

    /// Let the first failing observer stop delivery to the ones after it
    pub fn without_isolation(mut self) -> Self {
        self.isolate = false;
        self
    }

    pub fn on<F>(&self, kind: EventKind, observer: F)
    where
        F: Fn(&ExecutionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.observers
            .write()
            .entry(kind)
            .or_default()
            .push(Arc::new(observer));
    }

    pub fn observer_count(&self, kind: EventKind) -> usize {
        self.observers.read().get(&kind).map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        self.observers.write().clear();
    }

    pub fn emit(&self, event: &ExecutionEvent) {
        // snapshot so observers may register more observers
        let observers = match self.observers.read().get(&event.kind()) {
            Some(list) => list.clone(),
            None => return,
        };

        for (position, observer) in observers.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| observer(event)));
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{e:#}"),
                Err(_) => "observer panicked".to_string(),
            };

            warn!(
                "{:?} observer #{} failed for case {}: {}",
                event.kind(),
                position,
                event.index(),
                failure
            );
            if !self.isolate {
                break;
            }
        }
    }
}
