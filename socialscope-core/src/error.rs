//! Error types for socialscope-core

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Main error type for the socialscope-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The datastore is missing a table or column an analysis reads
    #[error("schema error: {0}")]
    Schema(String),

    /// Fewer data points than a computation requires
    #[error("insufficient data for {analysis}: {detail}")]
    InsufficientData {
        analysis: &'static str,
        detail: String,
    },

    /// Chart could not be written
    #[error("chart error: {0}")]
    Chart(String),

    /// Logging could not be initialized
    #[error("logging error: {0}")]
    Logging(String),

    /// Analysis not registered with the engine
    #[error("analysis not found: {0}")]
    AnalysisNotFound(String),
}

impl Error {
    /// Shorthand for an [`Error::InsufficientData`] error.
    pub fn insufficient(analysis: &'static str, detail: impl Into<String>) -> Self {
        Error::InsufficientData {
            analysis,
            detail: detail.into(),
        }
    }

    /// Whether this error means "nothing to report" rather than a failure.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Error::InsufficientData { .. })
    }
}

/// Result type alias for socialscope-core
pub type Result<T> = std::result::Result<T, Error>;

/// Kind of invalid row dropped during an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQualityIssue {
    /// Comment timestamp earlier than its post's creation time
    NegativeOffset,
    /// Timestamp missing or not parseable
    MissingTimestamp,
}

impl fmt::Display for DataQualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityIssue::NegativeOffset => write!(f, "negative time differences"),
            DataQualityIssue::MissingTimestamp => write!(f, "missing or unparseable timestamps"),
        }
    }
}

/// Non-fatal report of rows filtered out of a computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataQualityWarning {
    pub issue: DataQualityIssue,
    pub count: usize,
}

impl DataQualityWarning {
    /// Build a warning, logging it. Returns `None` when nothing was dropped.
    pub fn record(analysis: &str, issue: DataQualityIssue, count: usize) -> Option<Self> {
        if count == 0 {
            return None;
        }
        tracing::warn!(analysis, %issue, count, "Dropped rows (data quality issue)");
        Some(Self { issue, count })
    }
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Removed {} engagements with {} (data quality issue)",
            self.count, self.issue
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_message() {
        let err = Error::insufficient("growth", "need at least 2 months, found 1");
        assert!(err.is_insufficient_data());
        assert_eq!(
            err.to_string(),
            "insufficient data for growth: need at least 2 months, found 1"
        );
    }

    #[test]
    fn test_warning_only_when_rows_dropped() {
        assert!(DataQualityWarning::record("lifecycle", DataQualityIssue::NegativeOffset, 0).is_none());

        let warning =
            DataQualityWarning::record("lifecycle", DataQualityIssue::NegativeOffset, 4).unwrap();
        assert_eq!(warning.count, 4);
        assert_eq!(
            warning.to_string(),
            "Removed 4 engagements with negative time differences (data quality issue)"
        );
    }
}
