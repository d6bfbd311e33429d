//! Report sinks
//!
//! Destinations for rendered reports.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::format::ReportFormat;
use crate::error::{EngineError, EngineResult};

/// Persists a rendered report under a destination name
pub trait ReportSink: Send + Sync {
    /// Returns where the report ended up
    fn persist(
        &self,
        rendered: &str,
        destination: &str,
        format: ReportFormat,
    ) -> EngineResult<String>;
}

/// Writes reports as files below a base directory
#[derive(Clone, Debug)]
pub struct FileSink {
    base_dir: PathBuf,
}

impl FileSink {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// `<data dir>/ddt-runner/reports`
    pub fn default_dir() -> EngineResult<Self> {
        let base_dir = dirs::data_dir()
            .ok_or_else(|| {
                EngineError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Could not determine data directory",
                ))
            })?
            .join("ddt-runner")
            .join("reports");

        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Destination names without an extension get the format's one
    pub fn path_for(&self, destination: &str, format: ReportFormat) -> PathBuf {
        let path = self.base_dir.join(destination);
        if path.extension().is_some() {
            path
        } else {
            path.with_extension(format.extension())
        }
    }
}

impl ReportSink for FileSink {
    fn persist(
        &self,
        rendered: &str,
        destination: &str,
        format: ReportFormat,
    ) -> EngineResult<String> {
        let path = self.path_for(destination, format);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, rendered)?;
        debug!("Wrote {} byte {} report to {}", rendered.len(), format, path.display());
        Ok(path.display().to_string())
    }
}

/// Keeps rendered reports in memory, keyed by destination
#[derive(Debug, Default)]
pub struct MemorySink {
    documents: Mutex<HashMap<String, String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, destination: &str) -> Option<String> {
        self.documents.lock().get(destination).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }
}

impl ReportSink for MemorySink {
    fn persist(
        &self,
        rendered: &str,
        destination: &str,
        format: ReportFormat,
    ) -> EngineResult<String> {
        self.documents
            .lock()
            .insert(destination.to_string(), rendered.to_string());
        Ok(format!("memory://{}.{}", destination, format.extension()))
    }
}
