//! Error types for Doomscroll Tax

use thiserror::Error;

/// Errors that can occur while classifying frames or accounting a session
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid report: {0}")]
    InvalidReport(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Config encode error: {0}")]
    TomlEncodeError(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl EngineError {
    /// Whether this error was caused by caller-supplied data rather than the engine
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidReport(_)
                | EngineError::MissingField(_)
                | EngineError::InvalidFrame(_)
                | EngineError::JsonError(_)
        )
    }
}
