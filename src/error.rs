//! Custom error types for rustpubmed.
//!
//! This module defines all error types used throughout the application.
//! All functions return `Result<T, PubmedError>` instead of using `unwrap()`.
//!
//! Affiliation classification has no error variant: the classifier is total and
//! degrades to [`Classification::Unknown`](crate::classifier::Classification::Unknown).

use thiserror::Error;

/// Main error type for rustpubmed operations.
#[derive(Debug, Error)]
pub enum PubmedError {
    /// A mandatory article field (the PMID) is missing or unparsable.
    ///
    /// The pipeline treats this as a per-article skip, never as a batch failure.
    #[error("Malformed record{}: {}", id_suffix(.pubmed_id), .reason)]
    MalformedRecord {
        /// PMID text if one was present but rejected
        pubmed_id: Option<String>,
        /// Why the record was rejected
        reason: String,
    },

    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// XML is not well-formed
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Parsing error outside of XML tokenizing (attributes, encodings, payloads)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by NCBI
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// E-utilities returned an error
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: i32,
        /// Error message from API
        message: String,
    },

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl PubmedError {
    /// Shorthand for a [`PubmedError::MalformedRecord`].
    pub fn malformed(pubmed_id: Option<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            pubmed_id,
            reason: reason.into(),
        }
    }
}

fn id_suffix(pubmed_id: &Option<String>) -> String {
    pubmed_id
        .as_deref()
        .map(|id| format!(" {}", id))
        .unwrap_or_default()
}

/// Result type alias using `PubmedError`
pub type Result<T> = std::result::Result<T, PubmedError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| PubmedError::Parse(msg.to_string()))
    }
}
