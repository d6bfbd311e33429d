//! Report rendering
//!
//! Pure projections of the run history into the supported formats.

use std::fmt::{self, Write};

use super::format::ReportFormat;
use super::stats::HistoryStats;
use crate::error::{EngineError, EngineResult};
use crate::models::{TestCaseResult, TestRunSummary};

const TABLE_WIDTH: usize = 64;

/// Renders a borrowed slice of run summaries
pub struct ReportRenderer<'a> {
    runs: &'a [TestRunSummary],
}

impl<'a> ReportRenderer<'a> {
    pub fn new(runs: &'a [TestRunSummary]) -> Self {
        Self { runs }
    }

    pub fn render(&self, format: ReportFormat) -> EngineResult<String> {
        match format {
            ReportFormat::Json => Ok(serde_json::to_string(self.runs)?),
            ReportFormat::JsonPretty => Ok(serde_json::to_string_pretty(self.runs)?),
            ReportFormat::Csv => self.render_csv(),
            ReportFormat::Table => text(|out| self.render_table(out)),
            ReportFormat::Markdown => text(|out| self.render_markdown(out)),
            ReportFormat::Junit => text(|out| self.render_junit(out)),
        }
    }

    fn render_table(&self, out: &mut String) -> fmt::Result {
        let inner = TABLE_WIDTH - 2;

        for run in self.runs {
            writeln!(out, "╔{}╗", "═".repeat(inner))?;
            writeln!(out, "║ {:<w$} ║", truncate(&run.name, inner - 2), w = inner - 2)?;
            writeln!(out, "╠{}╣", "═".repeat(inner))?;

            for result in &run.results {
                let line = format!(
                    "{:>4}. {} {:<6} {:>8}ms  x{}",
                    result.index,
                    result.symbol(),
                    result.status_label(),
                    result.duration_ms,
                    result.attempts
                );
                writeln!(out, "║ {:<w$} ║", line, w = inner - 2)?;
                if let Some(error) = &result.error {
                    let detail = format!("      {}", truncate(error, inner - 8));
                    writeln!(out, "║ {:<w$} ║", detail, w = inner - 2)?;
                }
            }

            writeln!(out, "╠{}╣", "═".repeat(inner))?;
            let totals = format!(
                "Total: {} | Pass: {} | Fail: {}",
                run.total, run.passed, run.failed
            );
            writeln!(out, "║ {:<w$} ║", totals, w = inner - 2)?;
            let rate = format!(
                "Success Rate: {}% | Duration: {}ms",
                run.success_rate_label(),
                run.total_duration_ms
            );
            writeln!(out, "║ {:<w$} ║", rate, w = inner - 2)?;
            writeln!(out, "╚{}╝", "═".repeat(inner))?;
        }

        if self.runs.len() > 1 {
            let stats = HistoryStats::from_runs(self.runs);
            writeln!(
                out,
                "{} runs: {}/{} cases passed ({:.2}%)",
                stats.total_runs, stats.passed_cases, stats.total_cases, stats.pass_rate
            )?;
        }

        Ok(())
    }

    fn render_csv(&self) -> EngineResult<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([
                "run", "index", "passed", "attempts", "duration_ms", "error", "record",
            ])
            .map_err(csv_error)?;

        for run in self.runs {
            for result in &run.results {
                let row = [
                    run.name.clone(),
                    result.index.to_string(),
                    result.passed.to_string(),
                    result.attempts.to_string(),
                    result.duration_ms.to_string(),
                    result.error.clone().unwrap_or_default(),
                    result.record.to_string(),
                ];
                writer.write_record(&row).map_err(csv_error)?;
            }
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| EngineError::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| EngineError::Io(std::io::Error::other(e)))
    }

    fn render_markdown(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "# Test Run Report\n")?;

        let stats = HistoryStats::from_runs(self.runs);
        writeln!(out, "| Metric | Value |")?;
        writeln!(out, "|--------|-------|")?;
        writeln!(out, "| Runs | {} |", stats.total_runs)?;
        writeln!(out, "| Cases | {} |", stats.total_cases)?;
        writeln!(out, "| Passed | {} |", stats.passed_cases)?;
        writeln!(out, "| Failed | {} |", stats.failed_cases)?;
        writeln!(out, "| Pass Rate | {:.2}% |", stats.pass_rate)?;
        writeln!(out, "| Median Duration | {}ms |", stats.durations.median_ms)?;

        for run in self.runs {
            writeln!(out, "\n## {}\n", run.name)?;
            writeln!(
                out,
                "- **Passed:** {}/{} ({}%)",
                run.passed,
                run.total,
                run.success_rate_label()
            )?;
            writeln!(out, "- **Duration:** {}ms", run.total_duration_ms)?;
            writeln!(out, "- **Finished:** {}\n", run.timestamp.format("%Y-%m-%d %H:%M:%S UTC"))?;

            writeln!(out, "| # | Status | Attempts | Duration | Error |")?;
            writeln!(out, "|---|--------|----------|----------|-------|")?;
            for result in &run.results {
                writeln!(
                    out,
                    "| {} | {} {} | {} | {}ms | {} |",
                    result.index,
                    result.symbol(),
                    result.status_label(),
                    result.attempts,
                    result.duration_ms,
                    result.error.as_deref().unwrap_or("").replace('|', "\\|")
                )?;
            }
        }

        if !stats.flaky.is_empty() {
            writeln!(out, "\n## Flaky Cases\n")?;
            for case in &stats.flaky {
                writeln!(
                    out,
                    "- {} [{}]: {} pass / {} fail, {} retried pass(es)",
                    case.name, case.index, case.passes, case.failures, case.retried_passes
                )?;
            }
        }

        Ok(())
    }

    fn render_junit(&self, out: &mut String) -> fmt::Result {
        let total: usize = self.runs.iter().map(|r| r.total).sum();
        let failed: usize = self.runs.iter().map(|r| r.failed).sum();
        let duration: u64 = self.runs.iter().map(|r| r.total_duration_ms).sum();

        writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(
            out,
            r#"<testsuites tests="{}" failures="{}" time="{}">"#,
            total,
            failed,
            seconds(duration)
        )?;

        for run in self.runs {
            writeln!(
                out,
                r#"  <testsuite name="{}" tests="{}" failures="{}" time="{}" timestamp="{}">"#,
                escape_xml(&run.name),
                run.total,
                run.failed,
                seconds(run.total_duration_ms),
                run.timestamp.to_rfc3339()
            )?;
            for result in &run.results {
                write_junit_case(out, result)?;
            }
            writeln!(out, "  </testsuite>")?;
        }

        writeln!(out, "</testsuites>")
    }
}

fn write_junit_case(out: &mut String, result: &TestCaseResult) -> fmt::Result {
    let open = format!(
        r#"    <testcase name="{}[{}]" classname="{}" time="{}""#,
        escape_xml(&result.name),
        result.index,
        escape_xml(&result.name),
        seconds(result.duration_ms)
    );

    match &result.error {
        Some(error) if !result.passed => {
            writeln!(out, "{open}>")?;
            writeln!(
                out,
                r#"      <failure message="{}">attempts: {}</failure>"#,
                escape_xml(error),
                result.attempts
            )?;
            writeln!(out, "    </testcase>")
        }
        _ => writeln!(out, "{open}/>"),
    }
}

fn text<F>(render: F) -> EngineResult<String>
where
    F: FnOnce(&mut String) -> fmt::Result,
{
    let mut out = String::new();
    render(&mut out).map_err(|e| EngineError::Io(std::io::Error::other(e)))?;
    Ok(out)
}

fn csv_error(e: csv::Error) -> EngineError {
    EngineError::Io(std::io::Error::other(e))
}

fn seconds(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

fn escape_xml(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
