//! Data source collaborators
//!
//! A source turns a descriptor into records. The engine does not care about
//! transport or encoding; the sources here cover files and in-memory data.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::models::DataRecord;

/// Materialized output of a source load
#[derive(Clone, Debug, PartialEq)]
pub enum LoadedData {
    Sequence(Vec<DataRecord>),
    Single(DataRecord),
}

impl LoadedData {
    pub fn len(&self) -> usize {
        match self {
            LoadedData::Sequence(records) => records.len(),
            LoadedData::Single(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[DataRecord] {
        match self {
            LoadedData::Sequence(records) => records,
            LoadedData::Single(record) => std::slice::from_ref(record),
        }
    }

    pub fn into_records(self) -> Vec<DataRecord> {
        match self {
            LoadedData::Sequence(records) => records,
            LoadedData::Single(record) => vec![record],
        }
    }

    /// Interpret a parsed document: arrays are sequences of objects, a lone
    /// object is a single record.
    pub fn from_value(descriptor: &str, value: Value) -> EngineResult<Self> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    DataRecord::try_from(item).map_err(|other| {
                        EngineError::load_failure(
                            descriptor,
                            format!("item {i} is not an object: {other}"),
                        )
                    })
                })
                .collect::<EngineResult<Vec<_>>>()
                .map(LoadedData::Sequence),
            Value::Object(map) => Ok(LoadedData::Single(map.into())),
            other => Err(EngineError::load_failure(
                descriptor,
                format!("expected an array or object, found {other}"),
            )),
        }
    }
}

/// Source collaborator contract
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn load(&self, descriptor: &str) -> EngineResult<LoadedData>;
}

/// Encodings understood by [`FileSource`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
    Csv,
}

impl FileFormat {
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "json" => Some(FileFormat::Json),
            "yaml" | "yml" => Some(FileFormat::Yaml),
            "csv" => Some(FileFormat::Csv),
            _ => None,
        }
    }
}

/// Loads records from JSON, YAML or CSV files, chosen by extension
#[derive(Clone, Debug, Default)]
pub struct FileSource {
    base_dir: Option<PathBuf>,
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative descriptors against a base directory
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    fn resolve(&self, descriptor: &str) -> PathBuf {
        let path = PathBuf::from(descriptor);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }

    fn parse(descriptor: &str, format: FileFormat, content: &str) -> EngineResult<LoadedData> {
        match format {
            FileFormat::Json => {
                let value: Value = serde_json::from_str(content)
                    .map_err(|e| EngineError::load_failure(descriptor, e))?;
                LoadedData::from_value(descriptor, value)
            }
            FileFormat::Yaml => {
                let value: Value = serde_yaml::from_str(content)
                    .map_err(|e| EngineError::load_failure(descriptor, e))?;
                LoadedData::from_value(descriptor, value)
            }
            FileFormat::Csv => parse_csv(descriptor, content).map(LoadedData::Sequence),
        }
    }
}

/// Header row names the fields; every cell stays a string
fn parse_csv(descriptor: &str, content: &str) -> EngineResult<Vec<DataRecord>> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| EngineError::load_failure(descriptor, e))?
        .clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| EngineError::load_failure(descriptor, e))?;
        let record: DataRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        records.push(record);
    }

    Ok(records)
}

#[async_trait]
impl DataSource for FileSource {
    async fn load(&self, descriptor: &str) -> EngineResult<LoadedData> {
        let path = self.resolve(descriptor);
        let format = FileFormat::from_extension(&path)
            .ok_or_else(|| EngineError::UnsupportedFormat(descriptor.to_string()))?;

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| EngineError::load_failure(descriptor, e))?;

        let data = Self::parse(descriptor, format, &content)?;
        debug!("Loaded {} record(s) from {}", data.len(), path.display());
        Ok(data)
    }
}

/// Named in-memory datasets
#[derive(Clone, Debug, Default)]
pub struct InlineSource {
    datasets: HashMap<String, LoadedData>,
}

impl InlineSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(mut self, name: impl Into<String>, records: Vec<DataRecord>) -> Self {
        self.datasets
            .insert(name.into(), LoadedData::Sequence(records));
        self
    }

    pub fn with_single(mut self, name: impl Into<String>, record: DataRecord) -> Self {
        self.datasets.insert(name.into(), LoadedData::Single(record));
        self
    }
}

#[async_trait]
impl DataSource for InlineSource {
    async fn load(&self, descriptor: &str) -> EngineResult<LoadedData> {
        self.datasets
            .get(descriptor)
            .cloned()
            .ok_or_else(|| EngineError::load_failure(descriptor, "no such dataset"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_file_format_from_extension() {
        assert_eq!(
            FileFormat::from_extension(Path::new("a.JSON")),
            Some(FileFormat::Json)
        );
        assert_eq!(
            FileFormat::from_extension(Path::new("a.yml")),
            Some(FileFormat::Yaml)
        );
        assert_eq!(
            FileFormat::from_extension(Path::new("a.csv")),
            Some(FileFormat::Csv)
        );
        assert_eq!(FileFormat::from_extension(Path::new("a.xml")), None);
    }

    #[tokio::test]
    async fn test_load_json_sequence() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "users.json",
            r#"[{"user":"a","pass":"1"},{"user":"b","pass":"2"}]"#,
        );

        let data = FileSource::new().load(&path).await.unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.as_slice()[1].get_str("user"), Some("b"));
    }

    #[tokio::test]
    async fn test_load_json_single_object() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "one.json", r#"{"user":"solo"}"#);

        let data = FileSource::new()
            .with_base_dir(dir.path())
            .load("one.json")
            .await
            .unwrap();
        assert!(matches!(data, LoadedData::Single(_)));
    }

    #[tokio::test]
    async fn test_load_yaml_and_csv() {
        let dir = TempDir::new().unwrap();
        let yaml = write_file(&dir, "users.yaml", "- user: a\n  age: 3\n- user: b\n  age: 4\n");
        let csv = write_file(&dir, "users.csv", "user,pass,expected\na,1,ok\nb,2,fail\n");

        let yaml_data = FileSource::new().load(&yaml).await.unwrap();
        assert_eq!(yaml_data.len(), 2);
        assert_eq!(yaml_data.as_slice()[0].get("age"), Some(&serde_json::json!(3)));

        let csv_data = FileSource::new().load(&csv).await.unwrap();
        assert_eq!(csv_data.len(), 2);
        assert_eq!(csv_data.as_slice()[1].get_str("expected"), Some("fail"));
    }

    #[tokio::test]
    async fn test_load_failures() {
        let dir = TempDir::new().unwrap();
        let bad = write_file(&dir, "bad.json", "[1, 2]");
        let broken = write_file(&dir, "broken.json", "{not json");

        assert!(matches!(
            FileSource::new().load(&bad).await,
            Err(EngineError::LoadFailure { .. })
        ));
        assert!(matches!(
            FileSource::new().load(&broken).await,
            Err(EngineError::LoadFailure { .. })
        ));
        assert!(matches!(
            FileSource::new().load("missing.json").await,
            Err(EngineError::LoadFailure { .. })
        ));
        assert!(matches!(
            FileSource::new().load("data.xml").await,
            Err(EngineError::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_inline_source() {
        let source = InlineSource::new()
            .with_records("users", vec![DataRecord::new().with("user", "a")]);
        assert_eq!(source.load("users").await.unwrap().len(), 1);
        assert!(source.load("other").await.is_err());
    }
}
