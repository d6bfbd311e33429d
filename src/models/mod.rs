//! Data models for data-driven test execution
//!
//! This module contains the record type and result structures shared by
//! the provider, data manager, executor and reports.

mod record;
mod test_result;

pub use record::DataRecord;
pub use test_result::{TestCaseResult, TestRunSummary};
