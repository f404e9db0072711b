/// Centralized error types for the session/quote engine
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuoteError {
    // Network Errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("WebSocket connection failed: {0}")]
    WebSocketError(String),

    // Data Errors
    #[error("Invalid bar data: {0}")]
    InvalidBarData(String),

    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Deserialization failed: {0}")]
    DeserializationError(#[from] serde_json::Error),

    // Upstream API Errors
    #[error("Market data API error: {code} - {message}")]
    ApiError { code: i64, message: String },

    // Configuration Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // File I/O Errors
    #[error("File I/O error: {0}")]
    FileError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QuoteError>;

impl QuoteError {
    /// Transient failures that degrade to "no data yet" and are retried later
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            QuoteError::HttpError(_)
                | QuoteError::WebSocketError(_)
                | QuoteError::MissingData(_)
                | QuoteError::ApiError { .. }
        )
    }

    /// Caller bugs: surfaced immediately, never retried
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, QuoteError::InvalidParameter(_) | QuoteError::ConfigError(_))
    }

    /// Get error code for logging/monitoring
    pub fn error_code(&self) -> &str {
        match self {
            QuoteError::HttpError(_) => "NET_001",
            QuoteError::WebSocketError(_) => "NET_002",
            QuoteError::InvalidBarData(_) => "DATA_001",
            QuoteError::MissingData(_) => "DATA_002",
            QuoteError::DeserializationError(_) => "DATA_003",
            QuoteError::ApiError { .. } => "API_001",
            QuoteError::ConfigError(_) => "CFG_001",
            QuoteError::InvalidParameter(_) => "CFG_002",
            QuoteError::FileError(_) => "FILE_001",
        }
    }
}
