//! Error types for Kanhu.

use thiserror::Error;

/// Library-level error type for Kanhu operations.
#[derive(Error, Debug)]
pub enum KanhuError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No parseable documents found in corpus: {0}")]
    CorpusEmpty(String),

    #[error("Index IO error: {0}")]
    IndexIo(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("Model inference failed: {0}")]
    ModelInference(String),

    #[error("{label} timed out after {after:?}")]
    Timeout {
        label: &'static str,
        after: std::time::Duration,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Kanhu operations.
pub type Result<T> = std::result::Result<T, KanhuError>;
