//! Run reports
//!
//! Renders the executor's run history and hands it to report sinks.

mod format;
mod renderer;
mod sink;
mod stats;

pub use format::ReportFormat;
pub use renderer::ReportRenderer;
pub use sink::{FileSink, MemorySink, ReportSink};
pub use stats::{CaseRef, DurationStats, FlakyCase, HistoryStats};
