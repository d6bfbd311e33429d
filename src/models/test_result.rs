//! Test result models
//!
//! Per-case results and the aggregated run summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::DataRecord;

/// Outcome of one case: one record run through the routine, retries included
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub name: String,
    pub index: usize,
    pub record: DataRecord,
    pub passed: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

impl TestCaseResult {
    /// Start a case that has not run any attempt yet
    pub fn pending(name: impl Into<String>, index: usize, record: DataRecord) -> Self {
        Self {
            name: name.into(),
            index,
            record,
            passed: false,
            error: None,
            duration_ms: 0,
            attempts: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn pass(
        name: impl Into<String>,
        index: usize,
        record: DataRecord,
        duration_ms: u64,
    ) -> Self {
        Self {
            passed: true,
            duration_ms,
            attempts: 1,
            ..Self::pending(name, index, record)
        }
    }

    pub fn fail(
        name: impl Into<String>,
        index: usize,
        record: DataRecord,
        duration_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            error: Some(error.into()),
            duration_ms,
            attempts: 1,
            ..Self::pending(name, index, record)
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn symbol(&self) -> &'static str {
        if self.passed {
            "✓"
        } else {
            "✗"
        }
    }

    pub fn status_label(&self) -> &'static str {
        if self.passed {
            "PASS"
        } else {
            "FAIL"
        }
    }
}

impl fmt::Display for TestCaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}] {}ms ({} attempt{})",
            self.symbol(),
            self.name,
            self.index,
            self.duration_ms,
            self.attempts,
            if self.attempts == 1 { "" } else { "s" }
        )?;
        if let Some(err) = &self.error {
            write!(f, " - {err}")?;
        }
        Ok(())
    }
}

/// Aggregated outcome of one executor invocation
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunSummary {
    pub name: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Percentage in `[0, 100]`; `0` for an empty run
    pub success_rate: f64,
    pub total_duration_ms: u64,
    pub results: Vec<TestCaseResult>,
    pub timestamp: DateTime<Utc>,
}

impl TestRunSummary {
    pub fn new(name: impl Into<String>, results: Vec<TestCaseResult>) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        let failed = total - passed;
        let total_duration_ms = results.iter().map(|r| r.duration_ms).sum();
        let success_rate = if total == 0 {
            0.0
        } else {
            (passed as f64 / total as f64) * 100.0
        };

        Self {
            name: name.into(),
            total,
            passed,
            failed,
            success_rate,
            total_duration_ms,
            results,
            timestamp: Utc::now(),
        }
    }

    /// Success rate with two decimals, e.g. `"100.00"`
    pub fn success_rate_label(&self) -> String {
        format!("{:.2}", self.success_rate)
    }

    pub fn is_all_passed(&self) -> bool {
        self.passed == self.total
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestCaseResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

impl fmt::Display for TestRunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run - {}", self.name)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for result in &self.results {
            writeln!(f, "  {result}")?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {}",
            self.total, self.passed, self.failed
        )?;
        writeln!(
            f,
            "Success Rate: {}% | Duration: {}ms",
            self.success_rate_label(),
            self.total_duration_ms
        )
    }
}
