//! Error types shared across the prices workspace

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, PricesError>;

/// Errors raised by shared infrastructure (logging, configuration)
#[derive(Error, Debug)]
pub enum PricesError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Logging initialization failed: {0}")]
    Logging(String),
}

impl PricesError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }
}
