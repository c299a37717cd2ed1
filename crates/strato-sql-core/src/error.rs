//! Error types for the core SQL model.

use thiserror::Error;

/// Errors raised while parsing connection strings.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The connection string does not match the expected grammar.
    #[error("invalid database url: {0}")]
    InvalidUrl(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
