//! Engine error types
//!
//! Precondition violations surface from the call that hit them. Case-level
//! failures (`CaseTimeout`, `CaseFailure`) are absorbed by the retry loop and
//! only ever appear as messages inside a `TestCaseResult`.

use thiserror::Error;

/// Errors raised by the data provider, data manager, executor and reports
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Data provider is not loaded; call load() first")]
    ProviderNotLoaded,

    #[error("Failed to load data from {descriptor}: {reason}")]
    LoadFailure { descriptor: String, reason: String },

    #[error("Test timed out after {0}ms")]
    CaseTimeout(u64),

    #[error("Test failed: {0}")]
    CaseFailure(String),

    #[error("No test data found for identifier: {0}")]
    UnknownIdentifier(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn load_failure(descriptor: impl Into<String>, reason: impl ToString) -> Self {
        EngineError::LoadFailure {
            descriptor: descriptor.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error is recovered locally by the per-case retry loop
    pub fn is_case_level(&self) -> bool {
        matches!(
            self,
            EngineError::CaseTimeout(_) | EngineError::CaseFailure(_)
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EngineError::load_failure("users.json", "file not found");
        assert_eq!(
            err.to_string(),
            "Failed to load data from users.json: file not found"
        );
        assert_eq!(
            EngineError::CaseTimeout(50).to_string(),
            "Test timed out after 50ms"
        );
    }

    #[test]
    fn test_case_level_classification() {
        assert!(EngineError::CaseTimeout(10).is_case_level());
        assert!(EngineError::CaseFailure("boom".into()).is_case_level());
        assert!(!EngineError::ProviderNotLoaded.is_case_level());
        assert!(!EngineError::UnknownIdentifier("x".into()).is_case_level());
    }
}
