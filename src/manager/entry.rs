//! Isolated data entry types

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use crate::models::DataRecord;

/// Invoked with the entry's record when the entry is cleaned up
pub type CleanupHook = Arc<dyn Fn(&DataRecord) -> anyhow::Result<()> + Send + Sync>;

/// Produces the per-clone changes merged over the parent record
pub type CloneGenerator = Box<dyn Fn(usize, &DataRecord) -> DataRecord + Send + Sync>;

/// Field names injected into isolated records
pub const TEST_ID_FIELD: &str = "_test_id";
pub const CREATED_AT_FIELD: &str = "_created_at";
pub const TOKEN_FIELD: &str = "_isolation_token";

/// Options for [`DataManager::create_test_data`](super::DataManager::create_test_data)
#[derive(Clone)]
pub struct CreateOptions {
    /// Inject test id, creation timestamp and a random correlation token
    pub isolate: bool,
    /// Fields that receive a manager-wide auto-increment counter
    pub auto_increment: Vec<String>,
    pub cleanup: Option<CleanupHook>,
    pub dataset: Option<String>,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            isolate: true,
            auto_increment: Vec::new(),
            cleanup: None,
            dataset: None,
        }
    }
}

impl CreateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the template as-is, without isolation fields
    pub fn raw() -> Self {
        Self {
            isolate: false,
            ..Self::default()
        }
    }

    pub fn auto_increment(mut self, field: impl Into<String>) -> Self {
        self.auto_increment.push(field.into());
        self
    }

    pub fn on_cleanup<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DataRecord) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.cleanup = Some(Arc::new(hook));
        self
    }

    pub fn in_dataset(mut self, name: impl Into<String>) -> Self {
        self.dataset = Some(name.into());
        self
    }
}

impl fmt::Debug for CreateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateOptions")
            .field("isolate", &self.isolate)
            .field("auto_increment", &self.auto_increment)
            .field("cleanup", &self.cleanup.is_some())
            .field("dataset", &self.dataset)
            .finish()
    }
}

/// How clones differ from their parent
#[derive(Default)]
pub enum CloneModifications {
    #[default]
    None,
    /// `changes[i]` is merged over clone `i`; clones past the end are plain copies
    Indexed(Vec<DataRecord>),
    Generator(CloneGenerator),
}

impl CloneModifications {
    pub fn generator<F>(f: F) -> Self
    where
        F: Fn(usize, &DataRecord) -> DataRecord + Send + Sync + 'static,
    {
        CloneModifications::Generator(Box::new(f))
    }

    pub(super) fn for_clone(&self, index: usize, parent: &DataRecord) -> Option<DataRecord> {
        match self {
            CloneModifications::None => None,
            CloneModifications::Indexed(changes) => changes.get(index).cloned(),
            CloneModifications::Generator(f) => Some(f(index, parent)),
        }
    }
}

#[derive(Clone, Default)]
pub struct EntryMetadata {
    pub cleanup: Option<CleanupHook>,
    pub is_clone: bool,
    pub parent: Option<String>,
    pub dataset: Option<String>,
}

impl fmt::Debug for EntryMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryMetadata")
            .field("cleanup", &self.cleanup.is_some())
            .field("is_clone", &self.is_clone)
            .field("parent", &self.parent)
            .field("dataset", &self.dataset)
            .finish()
    }
}

/// Per-test materialized copy of a template
#[derive(Clone, Debug)]
pub struct IsolatedDataEntry {
    pub key: String,
    pub template: DataRecord,
    pub record: DataRecord,
    pub metadata: EntryMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Ordered records produced by one `create_dataset` call
#[derive(Clone, Debug)]
pub struct DatasetEntry {
    pub name: String,
    pub keys: Vec<String>,
    pub items: Vec<DataRecord>,
    pub created_at: DateTime<Utc>,
}

/// What a store key holds
#[derive(Clone, Debug)]
pub enum StoredItem {
    Entry(IsolatedDataEntry),
    Dataset(DatasetEntry),
}

impl StoredItem {
    pub fn is_dataset(&self) -> bool {
        matches!(self, StoredItem::Dataset(_))
    }

    pub fn is_clone(&self) -> bool {
        matches!(self, StoredItem::Entry(e) if e.metadata.is_clone)
    }

    pub fn as_entry(&self) -> Option<&IsolatedDataEntry> {
        match self {
            StoredItem::Entry(entry) => Some(entry),
            StoredItem::Dataset(_) => None,
        }
    }
}

/// Store occupancy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DataStats {
    pub total: usize,
    pub entries: usize,
    pub clones: usize,
    pub datasets: usize,
    pub pending_cleanups: usize,
}
