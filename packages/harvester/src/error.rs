//! Error types for the harvester.
//!
//! Extraction problems inside a page (missing fields, unresolvable nodes,
//! low-quality records) are reported as data on the chapter result, not as
//! errors. `HarvesterError` covers configuration mistakes and failures of the
//! collaborators around the extraction core (HTTP, filesystem, serialization).

use thiserror::Error;

/// Main error type for the harvester library.
#[derive(Debug, Error)]
pub enum HarvesterError {
    /// Work identifier not known to the configuration.
    #[error("Unknown work: '{0}'. Expected one of the configured works (e.g., bg, sb, cc)")]
    UnknownWork(String),

    /// Invalid work identifier format.
    #[error("Invalid work ID format: '{0}'. Expected lowercase letters, digits or '-' (e.g., bg)")]
    InvalidWorkId(String),

    /// Chapter number outside the range the work allows.
    #[error("Invalid chapter {chapter} for {work}: expected 1..={max}")]
    InvalidChapter { work: String, chapter: u32, max: u32 },

    /// Division number outside the range the work allows.
    #[error("Invalid division {division} for {work}{}", .max.map(|m| format!(": expected 1..={m}")).unwrap_or_else(|| " (work has no divisions)".to_string()))]
    InvalidDivision {
        work: String,
        division: u32,
        max: Option<u32>,
    },

    /// A configured CSS selector could not be parsed.
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    /// A pattern built from the label vocabulary failed to compile.
    #[error("Invalid label pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to download a page.
    #[error("Failed to download page {url}: {source}")]
    PageDownload {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// All retry attempts failed.
    #[error("Request failed after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error.
    #[error("YAML serialization failed: {0}")]
    YamlSerialization(#[from] serde_yaml_ng::Error),

    /// A chapter task panicked or was aborted.
    #[error("Chapter task failed: {0}")]
    TaskFailed(String),
}

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, HarvesterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HarvesterError::UnknownWork("xyz".to_string());
        assert!(err.to_string().contains("xyz"));
        assert!(err.to_string().contains("bg"));
    }

    #[test]
    fn test_invalid_division_with_max() {
        let err = HarvesterError::InvalidDivision {
            work: "sb".to_string(),
            division: 13,
            max: Some(12),
        };
        assert_eq!(err.to_string(), "Invalid division 13 for sb: expected 1..=12");
    }

    #[test]
    fn test_invalid_division_without_divisions() {
        let err = HarvesterError::InvalidDivision {
            work: "bg".to_string(),
            division: 1,
            max: None,
        };
        assert_eq!(
            err.to_string(),
            "Invalid division 1 for bg (work has no divisions)"
        );
    }
}
