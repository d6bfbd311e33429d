//! Test data manager
//!
//! Owns isolated per-test data entries, generated datasets and scheduled
//! cleanup timers.

mod entry;
mod store;

pub use entry::{
    CleanupHook, CloneModifications, CreateOptions, DataStats, DatasetEntry, EntryMetadata,
    IsolatedDataEntry, StoredItem, CREATED_AT_FIELD, TEST_ID_FIELD, TOKEN_FIELD,
};
pub use store::DataManager;
