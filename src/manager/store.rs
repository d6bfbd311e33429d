//! Isolated test data store
//!
//! Entries are keyed by a caller-chosen test identifier. Every mutation goes
//! through one store mutex; cleanup hooks always run after the lock is
//! released so a hook may call back into the manager.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::entry::{
    CloneModifications, CreateOptions, DataStats, DatasetEntry, EntryMetadata, IsolatedDataEntry,
    StoredItem, CREATED_AT_FIELD, TEST_ID_FIELD, TOKEN_FIELD,
};
use crate::error::{EngineError, EngineResult};
use crate::models::DataRecord;

struct ScheduledCleanup {
    generation: u64,
    handle: AbortHandle,
}

#[derive(Default)]
struct Inner {
    store: Mutex<HashMap<String, StoredItem>>,
    counters: Mutex<HashMap<String, u64>>,
    timers: Mutex<HashMap<String, ScheduledCleanup>>,
    next_generation: Mutex<u64>,
}

/// Owner of isolated per-test data entries.
///
/// Cloning the manager yields another handle onto the same store.
#[derive(Clone, Default)]
pub struct DataManager {
    inner: Arc<Inner>,
}

impl DataManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize `template` under `id`. An existing entry under the same
    /// id is replaced.
    pub fn create_test_data(
        &self,
        id: &str,
        template: &DataRecord,
        options: CreateOptions,
    ) -> DataRecord {
        let mut record = template.clone();

        if options.isolate {
            record.insert(TEST_ID_FIELD, id);
            record.insert(CREATED_AT_FIELD, Utc::now().to_rfc3339());
            record.insert(TOKEN_FIELD, generate_token());
        }

        if !options.auto_increment.is_empty() {
            let mut counters = self.inner.counters.lock();
            for field in &options.auto_increment {
                let counter = counters.entry(field.clone()).or_insert(0);
                *counter += 1;
                record.insert(field.clone(), *counter);
            }
        }

        let entry = IsolatedDataEntry {
            key: id.to_string(),
            template: template.clone(),
            record: record.clone(),
            metadata: EntryMetadata {
                cleanup: options.cleanup,
                dataset: options.dataset,
                ..EntryMetadata::default()
            },
            created_at: Utc::now(),
            updated_at: None,
        };

        let replaced = self
            .inner
            .store
            .lock()
            .insert(id.to_string(), StoredItem::Entry(entry));
        if replaced.is_some() {
            debug!("Replaced test data for {}", id);
        } else {
            debug!("Created test data for {}", id);
        }

        record
    }

    /// The isolated record stored under `id`
    pub fn get_test_data(&self, id: &str) -> Option<DataRecord> {
        self.inner
            .store
            .lock()
            .get(id)
            .and_then(StoredItem::as_entry)
            .map(|entry| entry.record.clone())
    }

    /// The full entry stored under `id`, metadata included
    pub fn get_entry(&self, id: &str) -> Option<IsolatedDataEntry> {
        self.inner
            .store
            .lock()
            .get(id)
            .and_then(StoredItem::as_entry)
            .cloned()
    }

    /// Shallow right-biased merge of `updates` over the record under `id`
    pub fn update_test_data(&self, id: &str, updates: &DataRecord) -> EngineResult<DataRecord> {
        let mut store = self.inner.store.lock();
        match store.get_mut(id) {
            Some(StoredItem::Entry(entry)) => {
                entry.record.merge(updates);
                entry.updated_at = Some(Utc::now());
                debug!("Updated test data for {} ({} field(s))", id, updates.len());
                Ok(entry.record.clone())
            }
            _ => Err(EngineError::UnknownIdentifier(id.to_string())),
        }
    }

    /// Store `count` independent copies of the parent's record under
    /// `{parent}_clone_{i}` and return their keys in order.
    pub fn clone_test_data(
        &self,
        parent_id: &str,
        count: usize,
        modifications: CloneModifications,
    ) -> EngineResult<Vec<String>> {
        let parent = self
            .get_test_data(parent_id)
            .ok_or_else(|| EngineError::UnknownIdentifier(parent_id.to_string()))?;
        let isolated = parent.contains_key(TEST_ID_FIELD);

        let mut clones = Vec::with_capacity(count);
        for i in 0..count {
            let key = format!("{parent_id}_clone_{i}");
            let mut record = parent.clone();
            if let Some(changes) = modifications.for_clone(i, &parent) {
                record.merge(&changes);
            }
            if isolated {
                record.insert(TEST_ID_FIELD, key.as_str());
                record.insert(TOKEN_FIELD, generate_token());
            }
            clones.push((key, record));
        }

        let now = Utc::now();
        let mut store = self.inner.store.lock();
        let keys = clones
            .into_iter()
            .map(|(key, record)| {
                let entry = IsolatedDataEntry {
                    key: key.clone(),
                    template: parent.clone(),
                    record,
                    metadata: EntryMetadata {
                        is_clone: true,
                        parent: Some(parent_id.to_string()),
                        ..EntryMetadata::default()
                    },
                    created_at: now,
                    updated_at: None,
                };
                store.insert(key.clone(), StoredItem::Entry(entry));
                key
            })
            .collect();

        debug!("Cloned {} into {} entries", parent_id, count);
        Ok(keys)
    }

    /// Generate `count` records, store each as `{name}_{i}`, and store the
    /// ordered list under `name` as a dataset.
    pub fn create_dataset<G>(
        &self,
        name: &str,
        mut generator: G,
        count: usize,
        options: CreateOptions,
    ) -> Vec<DataRecord>
    where
        G: FnMut(usize) -> DataRecord,
    {
        let options = options.in_dataset(name);
        let mut keys = Vec::with_capacity(count);
        let mut items = Vec::with_capacity(count);

        for i in 0..count {
            let key = format!("{name}_{i}");
            let template = generator(i);
            items.push(self.create_test_data(&key, &template, options.clone()));
            keys.push(key);
        }

        let dataset = DatasetEntry {
            name: name.to_string(),
            keys,
            items: items.clone(),
            created_at: Utc::now(),
        };
        self.inner
            .store
            .lock()
            .insert(name.to_string(), StoredItem::Dataset(dataset));

        info!("Created dataset {} with {} item(s)", name, count);
        items
    }

    pub fn get_dataset(&self, name: &str) -> Option<Vec<DataRecord>> {
        match self.inner.store.lock().get(name) {
            Some(StoredItem::Dataset(dataset)) => Some(dataset.items.clone()),
            _ => None,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.store.lock().contains_key(id)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.store.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Remove the entry under `id`, running its cleanup hook first.
    ///
    /// Hook failures are logged and absorbed. Returns whether anything was
    /// stored under `id`.
    pub fn cleanup_test_data(&self, id: &str) -> bool {
        if let Some(timer) = self.inner.timers.lock().remove(id) {
            timer.handle.abort();
        }
        self.remove_item(id)
    }

    /// Remove every item matching `predicate` (all items when `None`) and
    /// return how many were removed.
    pub fn cleanup_all(&self, predicate: Option<&dyn Fn(&str, &StoredItem) -> bool>) -> usize {
        let keys: Vec<String> = {
            let store = self.inner.store.lock();
            store
                .iter()
                .filter(|(key, item)| predicate.map_or(true, |p| p(key.as_str(), item)))
                .map(|(key, _)| key.clone())
                .collect()
        };

        let removed = keys
            .iter()
            .filter(|key| self.cleanup_test_data(key))
            .count();

        info!("Cleaned up {} test data item(s)", removed);
        removed
    }

    /// Clean up `id` once `delay` has elapsed.
    ///
    /// Scheduling again for the same id replaces the pending timer. Needs a
    /// running tokio runtime; returns false when there is none.
    pub fn schedule_cleanup(&self, id: &str, delay: Duration) -> bool {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("Cannot schedule cleanup for {}: no async runtime", id);
                return false;
            }
        };

        let generation = {
            let mut next = self.inner.next_generation.lock();
            *next += 1;
            *next
        };

        // hold the timer map while spawning so the task cannot fire before
        // its handle is registered
        let mut timers = self.inner.timers.lock();

        let manager = self.clone();
        let key = id.to_string();
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            manager.fire_scheduled(&key, generation);
        });

        let scheduled = ScheduledCleanup {
            generation,
            handle: task.abort_handle(),
        };
        if let Some(previous) = timers.insert(id.to_string(), scheduled) {
            previous.handle.abort();
            debug!("Replaced pending cleanup for {}", id);
        }

        debug!("Scheduled cleanup for {} in {}ms", id, delay.as_millis());
        true
    }

    /// Cancel a pending scheduled cleanup; returns whether one was pending
    pub fn cancel_scheduled_cleanup(&self, id: &str) -> bool {
        match self.inner.timers.lock().remove(id) {
            Some(timer) => {
                timer.handle.abort();
                debug!("Cancelled scheduled cleanup for {}", id);
                true
            }
            None => false,
        }
    }

    pub fn get_stats(&self) -> DataStats {
        let store = self.inner.store.lock();
        let mut stats = DataStats {
            total: store.len(),
            pending_cleanups: self.inner.timers.lock().len(),
            ..DataStats::default()
        };

        for item in store.values() {
            match item {
                StoredItem::Dataset(_) => stats.datasets += 1,
                StoredItem::Entry(entry) if entry.metadata.is_clone => stats.clones += 1,
                StoredItem::Entry(_) => stats.entries += 1,
            }
        }

        stats
    }

    /// Cancel all pending timers and drop every stored item. Cleanup hooks
    /// are not run.
    pub fn reset(&self) {
        for (_, timer) in self.inner.timers.lock().drain() {
            timer.handle.abort();
        }
        self.inner.store.lock().clear();
        self.inner.counters.lock().clear();
        info!("Test data manager reset");
    }

    fn fire_scheduled(&self, id: &str, generation: u64) {
        {
            let mut timers = self.inner.timers.lock();
            match timers.get(id) {
                Some(timer) if timer.generation == generation => {
                    timers.remove(id);
                }
                // superseded or cancelled after the sleep completed
                _ => return,
            }
        }
        debug!("Scheduled cleanup fired for {}", id);
        self.remove_item(id);
    }

    fn remove_item(&self, id: &str) -> bool {
        let removed = self.inner.store.lock().remove(id);

        match removed {
            Some(StoredItem::Entry(entry)) => {
                if let Some(hook) = &entry.metadata.cleanup {
                    match panic::catch_unwind(AssertUnwindSafe(|| hook(&entry.record))) {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!("Cleanup hook for {} failed: {:#}", id, e),
                        Err(_) => warn!("Cleanup hook for {} panicked", id),
                    }
                }
                debug!("Cleaned up test data for {}", id);
                true
            }
            Some(StoredItem::Dataset(_)) => {
                debug!("Cleaned up dataset {}", id);
                true
            }
            None => {
                debug!("No test data to clean up for {}", id);
                false
            }
        }
    }
}

/// Random correlation token, 16 hex digits
fn generate_token() -> String {
    format!("{:016x}", rand::random::<u64>())
}
