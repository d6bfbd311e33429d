//! Data provider
//!
//! Loads an ordered sequence of records through a [`DataSource`] and exposes
//! read-only views over it.

use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{info, warn};

use super::source::{DataSource, LoadedData};
use crate::error::{EngineError, EngineResult};
use crate::models::DataRecord;

#[derive(Clone, Debug, Default)]
enum ProviderState {
    #[default]
    NotLoaded,
    Loaded(LoadedData),
}

/// Loaded-or-not view over a data source
pub struct DataProvider {
    source: Arc<dyn DataSource>,
    state: ProviderState,
}

impl DataProvider {
    pub fn new(source: impl DataSource + 'static) -> Self {
        Self::with_source(Arc::new(source))
    }

    pub fn with_source(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            state: ProviderState::NotLoaded,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ProviderState::Loaded(_))
    }

    /// Load one source, replacing anything loaded before.
    ///
    /// On failure the provider is left NotLoaded.
    pub async fn load(&mut self, descriptor: &str) -> EngineResult<()> {
        self.state = ProviderState::NotLoaded;

        match self.source.load(descriptor).await {
            Ok(data) => {
                info!("Loaded {} record(s) from {}", data.len(), descriptor);
                self.state = ProviderState::Loaded(data);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to load {}: {}", descriptor, e);
                Err(e)
            }
        }
    }

    /// Load several sources and concatenate them in descriptor order.
    ///
    /// All-or-nothing: the loads are joined with `try_join_all`, which stops
    /// at the first error, so one failing source leaves the provider
    /// NotLoaded.
    pub async fn load_multiple<S: AsRef<str>>(&mut self, descriptors: &[S]) -> EngineResult<()> {
        self.state = ProviderState::NotLoaded;

        let loads = descriptors
            .iter()
            .map(|d| self.source.load(d.as_ref()));
        let loaded = try_join_all(loads).await?;

        let records: Vec<DataRecord> = loaded
            .into_iter()
            .flat_map(LoadedData::into_records)
            .collect();

        info!(
            "Loaded {} record(s) from {} sources",
            records.len(),
            descriptors.len()
        );
        self.state = ProviderState::Loaded(LoadedData::Sequence(records));
        Ok(())
    }

    /// The loaded value as produced by the source
    pub fn data(&self) -> EngineResult<&LoadedData> {
        match &self.state {
            ProviderState::Loaded(data) => Ok(data),
            ProviderState::NotLoaded => Err(EngineError::ProviderNotLoaded),
        }
    }

    /// The loaded value viewed as a sequence
    pub fn all_data(&self) -> EngineResult<&[DataRecord]> {
        self.data().map(LoadedData::as_slice)
    }

    /// The i-th record of a sequence. A scalar-loaded source answers with
    /// its single record for every index.
    pub fn data_by_index(&self, index: usize) -> EngineResult<Option<&DataRecord>> {
        Ok(match self.data()? {
            LoadedData::Sequence(records) => records.get(index),
            LoadedData::Single(record) => Some(record),
        })
    }

    pub fn filter<P>(&self, predicate: P) -> EngineResult<Vec<DataRecord>>
    where
        P: Fn(&DataRecord) -> bool,
    {
        Ok(self
            .all_data()?
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect())
    }

    pub fn map<T, F>(&self, f: F) -> EngineResult<Vec<T>>
    where
        F: Fn(&DataRecord) -> T,
    {
        Ok(self.all_data()?.iter().map(f).collect())
    }

    pub fn count(&self) -> EngineResult<usize> {
        Ok(self.all_data()?.len())
    }

    pub fn count_where<P>(&self, predicate: P) -> EngineResult<usize>
    where
        P: Fn(&DataRecord) -> bool,
    {
        Ok(self.all_data()?.iter().filter(|r| predicate(r)).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InlineSource;

    fn users() -> Vec<DataRecord> {
        vec![
            DataRecord::new().with("user", "a").with("expected", "ok"),
            DataRecord::new().with("user", "b").with("expected", "fail"),
            DataRecord::new().with("user", "c").with("expected", "ok"),
        ]
    }

    fn source() -> InlineSource {
        InlineSource::new()
            .with_records("users", users())
            .with_records("admins", vec![DataRecord::new().with("user", "root")])
            .with_single("config", DataRecord::new().with("env", "staging"))
    }

    #[tokio::test]
    async fn test_views_require_load() {
        let provider = DataProvider::new(source());
        assert!(!provider.is_loaded());
        assert!(matches!(
            provider.all_data(),
            Err(EngineError::ProviderNotLoaded)
        ));
        assert!(matches!(provider.data(), Err(EngineError::ProviderNotLoaded)));
        assert!(provider.count().is_err());
        assert!(provider.data_by_index(0).is_err());
    }

    #[tokio::test]
    async fn test_load_and_views() {
        let mut provider = DataProvider::new(source());
        provider.load("users").await.unwrap();

        assert_eq!(provider.count().unwrap(), 3);
        assert_eq!(
            provider.data_by_index(1).unwrap().unwrap().get_str("user"),
            Some("b")
        );
        assert!(provider.data_by_index(9).unwrap().is_none());

        let ok = provider.filter(|r| r.field_equals("expected", "ok")).unwrap();
        assert_eq!(ok.len(), 2);
        assert_eq!(provider.count_where(|r| r.field_equals("expected", "fail")).unwrap(), 1);

        let names = provider
            .map(|r| r.get_str("user").unwrap_or_default().to_string())
            .unwrap();
        assert_eq!(names, vec!["a", "b", "c"]);

        // projections never mutate
        assert_eq!(provider.count().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_repeated_reads_are_equal() {
        let mut provider = DataProvider::new(source());
        provider.load("users").await.unwrap();
        let first = provider.all_data().unwrap().to_vec();
        let second = provider.all_data().unwrap().to_vec();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_reload_replaces_sequence() {
        let mut provider = DataProvider::new(source());
        provider.load("users").await.unwrap();
        provider.load("admins").await.unwrap();
        assert_eq!(provider.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scalar_source_ignores_index() {
        let mut provider = DataProvider::new(source());
        provider.load("config").await.unwrap();
        let first = provider.data_by_index(0).unwrap().cloned();
        let far = provider.data_by_index(42).unwrap().cloned();
        assert_eq!(first, far);
        assert_eq!(provider.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_resets_state() {
        let mut provider = DataProvider::new(source());
        provider.load("users").await.unwrap();
        let err = provider.load("missing").await.unwrap_err();
        assert!(matches!(err, EngineError::LoadFailure { .. }));
        assert!(!provider.is_loaded());
    }

    #[tokio::test]
    async fn test_load_multiple_concatenates() {
        let mut provider = DataProvider::new(source());
        provider
            .load_multiple(&["users", "admins", "config"])
            .await
            .unwrap();
        let users: Vec<_> = provider
            .map(|r| r.get_str("user").map(str::to_string))
            .unwrap();
        assert_eq!(users.len(), 5);
        assert_eq!(users[3].as_deref(), Some("root"));
        assert_eq!(users[4], None);
    }

    #[tokio::test]
    async fn test_load_multiple_is_all_or_nothing() {
        let mut provider = DataProvider::new(source());
        let result = provider.load_multiple(&["users", "missing"]).await;
        assert!(result.is_err());
        assert!(!provider.is_loaded());
    }
}
