//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "DDT_RUNNER";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Timeout from DDT_RUNNER_TIMEOUT_MS
    pub timeout_ms: Option<u64>,
    /// Retries from DDT_RUNNER_RETRIES
    pub retries: Option<u32>,
    /// Concurrent mode from DDT_RUNNER_CONCURRENT
    pub concurrent: Option<bool>,
    /// Concurrency cap from DDT_RUNNER_MAX_CONCURRENCY
    pub max_concurrency: Option<usize>,
    /// Report format from DDT_RUNNER_FORMAT
    pub format: Option<String>,
    /// Report directory from DDT_RUNNER_REPORT_DIR
    pub report_dir: Option<String>,
    /// Config file from DDT_RUNNER_CONFIG
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            timeout_ms: get_env_parse("TIMEOUT_MS"),
            retries: get_env_parse("RETRIES"),
            concurrent: get_env_bool("CONCURRENT"),
            max_concurrency: get_env_parse("MAX_CONCURRENCY"),
            format: get_env("FORMAT"),
            report_dir: get_env("REPORT_DIR"),
            config_file: get_env("CONFIG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.timeout_ms.is_some()
            || self.retries.is_some()
            || self.concurrent.is_some()
            || self.max_concurrency.is_some()
            || self.format.is_some()
            || self.report_dir.is_some()
            || self.config_file.is_some()
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_TIMEOUT_MS:      {:?}", ENV_PREFIX, self.timeout_ms);
        println!("  {}_RETRIES:         {:?}", ENV_PREFIX, self.retries);
        println!("  {}_CONCURRENT:      {:?}", ENV_PREFIX, self.concurrent);
        println!("  {}_MAX_CONCURRENCY: {:?}", ENV_PREFIX, self.max_concurrency);
        println!("  {}_FORMAT:          {:?}", ENV_PREFIX, self.format);
        println!("  {}_REPORT_DIR:      {:?}", ENV_PREFIX, self.report_dir);
        println!("  {}_CONFIG:          {:?}", ENV_PREFIX, self.config_file);
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Builder for setting environment variables (useful for testing)
#[derive(Default)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `DDT_RUNNER_<name>`
    pub fn var(mut self, name: &str, value: impl ToString) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.to_string()));
        self
    }

    pub fn timeout_ms(self, timeout_ms: u64) -> Self {
        self.var("TIMEOUT_MS", timeout_ms)
    }

    pub fn retries(self, retries: u32) -> Self {
        self.var("RETRIES", retries)
    }

    pub fn concurrent(self, concurrent: bool) -> Self {
        self.var("CONCURRENT", concurrent)
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        for (key, value) in self.vars {
            env::set_var(key, value);
        }

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print all DDT_RUNNER environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_TIMEOUT_MS       Per-attempt timeout in milliseconds");
    println!("  {ENV_PREFIX}_RETRIES          Retries after a failed attempt");
    println!("  {ENV_PREFIX}_CONCURRENT       Run records concurrently (true/false)");
    println!("  {ENV_PREFIX}_MAX_CONCURRENCY  Cap on concurrent cases");
    println!("  {ENV_PREFIX}_FORMAT           Report format (table, json, csv, markdown, junit)");
    println!("  {ENV_PREFIX}_REPORT_DIR       Directory reports are saved to");
    println!("  {ENV_PREFIX}_CONFIG           Path to configuration file");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_RETRIES=2");
    println!("  ddt-runner run --data users.csv --field expected --equals ok");
}
