//! Error types for the ORM.

use thiserror::Error;

/// ORM-specific errors.
#[derive(Debug, Error)]
pub enum OrmError {
    /// Engine configuration problem (bad URL, unknown driver, ...).
    #[error("config error: {0}")]
    Config(String),

    /// API misuse detected before any statement was sent.
    #[error("usage error: {0}")]
    Usage(String),

    /// Driver error from sqlx.
    #[error("database error: {0}")]
    Driver(#[from] sqlx::Error),

    /// Operation the target backend cannot perform.
    #[error("unsupported on this backend: {0}")]
    Unsupported(String),

    /// A column value could not be decoded into the requested type.
    #[error("decode error: {0}")]
    Decode(String),

    /// Error from SQL construction.
    #[error(transparent)]
    Core(#[from] strato_sql_core::CoreError),
}

/// Result type alias for ORM operations.
pub type Result<T> = std::result::Result<T, OrmError>;
