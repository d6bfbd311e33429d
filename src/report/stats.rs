//! History statistics
//!
//! Aggregates across every run the executor has recorded: pass rates,
//! duration spread, slowest and failing cases, and cases whose outcome is
//! not stable.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::TestRunSummary;

const SLOWEST_LIMIT: usize = 10;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DurationStats {
    pub min_ms: u64,
    pub max_ms: u64,
    pub avg_ms: f64,
    pub median_ms: u64,
    pub total_ms: u64,
}

impl DurationStats {
    fn from_durations(mut durations: Vec<u64>) -> Self {
        if durations.is_empty() {
            return Self::default();
        }

        durations.sort_unstable();
        let total_ms: u64 = durations.iter().sum();

        Self {
            min_ms: durations[0],
            max_ms: durations[durations.len() - 1],
            avg_ms: total_ms as f64 / durations.len() as f64,
            median_ms: durations[durations.len() / 2],
            total_ms,
        }
    }
}

/// A case identified by run name and record index
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CaseRef {
    pub name: String,
    pub index: usize,
    pub duration_ms: u64,
    pub attempts: u32,
    pub error: Option<String>,
}

/// A record whose outcome differed between attempts or runs
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlakyCase {
    pub name: String,
    pub index: usize,
    pub passes: usize,
    pub failures: usize,
    /// Passes that needed more than one attempt
    pub retried_passes: usize,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct HistoryStats {
    pub total_runs: usize,
    pub total_cases: usize,
    pub passed_cases: usize,
    pub failed_cases: usize,
    pub pass_rate: f64,
    pub durations: DurationStats,
    /// Slowest first
    pub slowest: Vec<CaseRef>,
    pub failed: Vec<CaseRef>,
    pub flaky: Vec<FlakyCase>,
}

impl HistoryStats {
    pub fn from_runs(runs: &[TestRunSummary]) -> Self {
        let mut cases = Vec::new();
        let mut outcomes: BTreeMap<(String, usize), FlakyCase> = BTreeMap::new();

        for run in runs {
            for result in &run.results {
                cases.push(CaseRef {
                    name: result.name.clone(),
                    index: result.index,
                    duration_ms: result.duration_ms,
                    attempts: result.attempts,
                    error: result.error.clone(),
                });

                let entry = outcomes
                    .entry((result.name.clone(), result.index))
                    .or_insert_with(|| FlakyCase {
                        name: result.name.clone(),
                        index: result.index,
                        passes: 0,
                        failures: 0,
                        retried_passes: 0,
                    });
                if result.passed {
                    entry.passes += 1;
                    if result.attempts > 1 {
                        entry.retried_passes += 1;
                    }
                } else {
                    entry.failures += 1;
                }
            }
        }

        let total_cases = cases.len();
        let failed: Vec<CaseRef> = cases.iter().filter(|c| c.error.is_some()).cloned().collect();
        let failed_cases = runs.iter().map(|r| r.failed).sum();
        let passed_cases = runs.iter().map(|r| r.passed).sum();
        let pass_rate = if total_cases == 0 {
            0.0
        } else {
            passed_cases as f64 / total_cases as f64 * 100.0
        };

        let durations =
            DurationStats::from_durations(cases.iter().map(|c| c.duration_ms).collect());

        let mut slowest = cases;
        slowest.sort_by(|a, b| b.duration_ms.cmp(&a.duration_ms));
        slowest.truncate(SLOWEST_LIMIT);

        let flaky = outcomes
            .into_values()
            .filter(|c| (c.passes > 0 && c.failures > 0) || c.retried_passes > 0)
            .collect();

        Self {
            total_runs: runs.len(),
            total_cases,
            passed_cases,
            failed_cases,
            pass_rate,
            durations,
            slowest,
            failed,
            flaky,
        }
    }
}
