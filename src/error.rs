//! Error types for the VnStock agent

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Failed to parse model output: {message} | raw={raw}")]
    OutputParse { message: String, raw: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Market data error: {0}")]
    MarketData(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
