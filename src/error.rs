//! Error types for fltools

use thiserror::Error;

/// Main error type for fltools operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported container: {0}")]
    UnsupportedContainer(String),

    #[error("Invalid file format: {0}")]
    Format(String),

    #[error("Invalid schema: {0}")]
    Schema(String),

    #[error("Unknown enum value {value} in column '{column}'")]
    UnknownEnumValue { column: String, value: u64 },

    #[error("Truncated text data: need {needed} bytes at offset {offset:#x}")]
    TruncatedText { offset: usize, needed: usize },

    #[error("Malformed row: expected {expected} bytes, got {actual}")]
    MalformedRow { expected: usize, actual: usize },

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Language not found for table '{table}': {language}")]
    LanguageNotFound { table: String, language: String },

    #[error("Table already exists: {0}")]
    TableExists(String),
}

/// Result type alias for fltools operations
pub type Result<T> = std::result::Result<T, Error>;
