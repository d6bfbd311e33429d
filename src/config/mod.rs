//! Configuration module
//!
//! Engine defaults from a YAML/JSON file, overridable from the environment.

mod env;

pub use env::{print_env_help, EnvBuilder, EnvConfig, EnvGuard};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::report::ReportFormat;

/// Engine configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,

    /// Retries after the first failed attempt
    pub max_retries: u32,

    /// Run all records concurrently instead of one after another
    pub concurrent: bool,

    /// Cap on in-flight cases when concurrent; unbounded when absent
    pub max_concurrency: Option<usize>,

    /// Report format name
    pub report_format: String,

    /// Directory reports are saved to
    pub report_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_retries: 0,
            concurrent: false,
            max_concurrency: None,
            report_format: "table".to_string(),
            report_dir: dirs::data_dir().map(|d| d.join("ddt-runner").join("reports")),
        }
    }
}

impl EngineConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = if is_yaml(path) {
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?
        } else {
            serde_json::from_str(&content).context("Failed to parse JSON config")?
        };

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Apply environment overrides on top of this configuration
    pub fn with_env(mut self, env: &EnvConfig) -> Self {
        if let Some(timeout_ms) = env.timeout_ms {
            self.timeout_ms = timeout_ms;
        }
        if let Some(retries) = env.retries {
            self.max_retries = retries;
        }
        if let Some(concurrent) = env.concurrent {
            self.concurrent = concurrent;
        }
        if env.max_concurrency.is_some() {
            self.max_concurrency = env.max_concurrency;
        }
        if let Some(format) = &env.format {
            self.report_format = format.clone();
        }
        if let Some(dir) = &env.report_dir {
            self.report_dir = Some(PathBuf::from(dir));
        }
        self
    }

    /// Configured report format, falling back to `table` for unknown names
    pub fn report_format(&self) -> ReportFormat {
        ReportFormat::from_str(&self.report_format).unwrap_or_else(|e| {
            warn!("{}; using table", e);
            ReportFormat::Table
        })
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.max_retries, 0);
        assert!(!config.concurrent);
        assert_eq!(config.report_format(), ReportFormat::Table);
    }

    #[test]
    fn test_yaml_round_trip_and_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.yaml");

        let config = EngineConfig {
            max_retries: 3,
            concurrent: true,
            max_concurrency: Some(4),
            ..EngineConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);

        let partial = dir.path().join("partial.json");
        std::fs::write(&partial, r#"{"timeout_ms": 500}"#).unwrap();
        let loaded = EngineConfig::load(&partial).unwrap();
        assert_eq!(loaded.timeout_ms, 500);
        assert_eq!(loaded.report_format, "table");
    }

    #[test]
    fn test_env_overrides() {
        let env = EnvConfig {
            timeout_ms: Some(250),
            retries: Some(2),
            format: Some("junit".to_string()),
            ..EnvConfig::default()
        };

        let config = EngineConfig::default().with_env(&env);
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.max_retries, 2);
        assert!(!config.concurrent);
        assert_eq!(config.report_format(), ReportFormat::Junit);
    }

    #[test]
    fn test_unknown_format_falls_back() {
        let config = EngineConfig {
            report_format: "html".to_string(),
            ..EngineConfig::default()
        };
        assert_eq!(config.report_format(), ReportFormat::Table);
    }
}
