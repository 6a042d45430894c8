use std::fmt::Display;

use rusqlite::Error as SqliteError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Error kinds map directly onto the catalog's error handling design:
/// `Io` is caught at per-file loop boundaries (scan/archive), `Fatal` and
/// `SchemaViolation` abort the current batch, `Parse` never leaves the
/// function that detects it, and `Config` is a user-input error.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] SqliteError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("time error: {0}")]
    Time(String),
    #[error("fatal: {0}")]
    Fatal(String),
    #[error("schema invariant violated: {0}")]
    SchemaViolation(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn time<E>(err: E) -> Self
    where
        E: Display,
    {
        Self::Time(err.to_string())
    }

    pub fn fatal<E>(err: E) -> Self
    where
        E: Display,
    {
        Self::Fatal(err.to_string())
    }

    pub fn schema<E>(err: E) -> Self
    where
        E: Display,
    {
        Self::SchemaViolation(err.to_string())
    }

    pub fn parse<E>(err: E) -> Self
    where
        E: Display,
    {
        Self::Parse(err.to_string())
    }

    pub fn internal<E>(err: E) -> Self
    where
        E: Display,
    {
        Self::Internal(err.to_string())
    }
}
