//! Report formats

use std::fmt;

use crate::error::{EngineError, EngineResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    JsonPretty,
    Table,
    Csv,
    Markdown,
    Junit,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 6] = [
        ReportFormat::Json,
        ReportFormat::JsonPretty,
        ReportFormat::Table,
        ReportFormat::Csv,
        ReportFormat::Markdown,
        ReportFormat::Junit,
    ];

    pub fn from_str(s: &str) -> EngineResult<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "json-pretty" | "jsonpretty" => Ok(ReportFormat::JsonPretty),
            "table" | "text" => Ok(ReportFormat::Table),
            "csv" => Ok(ReportFormat::Csv),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "junit" | "xml" => Ok(ReportFormat::Junit),
            _ => Err(EngineError::UnsupportedFormat(s.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::JsonPretty => "json-pretty",
            ReportFormat::Table => "table",
            ReportFormat::Csv => "csv",
            ReportFormat::Markdown => "markdown",
            ReportFormat::Junit => "junit",
        }
    }

    /// File extension used when a report is persisted
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Json | ReportFormat::JsonPretty => "json",
            ReportFormat::Table => "txt",
            ReportFormat::Csv => "csv",
            ReportFormat::Markdown => "md",
            ReportFormat::Junit => "xml",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!(ReportFormat::from_str("JSON").unwrap(), ReportFormat::Json);
        assert_eq!(ReportFormat::from_str("md").unwrap(), ReportFormat::Markdown);
        assert!(matches!(
            ReportFormat::from_str("html"),
            Err(EngineError::UnsupportedFormat(name)) if name == "html"
        ));
    }

    #[test]
    fn test_names_parse_back() {
        for format in ReportFormat::ALL {
            assert_eq!(ReportFormat::from_str(format.name()).unwrap(), format);
        }
        assert_eq!(ReportFormat::Junit.extension(), "xml");
    }
}
