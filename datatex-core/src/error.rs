//! Error types for DataTeX.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using the store's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Store error.
#[derive(Error, Debug)]
pub enum Error {
    /// The database could not be opened or migrated at startup.
    #[error("store is not initialized")]
    NotInitialized,

    /// A UNIQUE, NOT NULL or FOREIGN KEY constraint rejected a write.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(e, msg) = &err {
            if e.code == rusqlite::ErrorCode::ConstraintViolation {
                return Error::ConstraintViolation(
                    msg.clone().unwrap_or_else(|| err.to_string()),
                );
            }
        }
        Error::Database(err)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotInitialized => ErrorKind::NotInitialized,
            Self::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Database(_) => ErrorKind::Database,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Caller-facing classification shared by store and compile failures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotInitialized,
    ConstraintViolation,
    NotFound,
    ProcessFailed,
    Timeout,
    ArtifactMissing,
    Setup,
    Database,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not_initialized",
            Self::ConstraintViolation => "constraint_violation",
            Self::NotFound => "not_found",
            Self::ProcessFailed => "process_failed",
            Self::Timeout => "timeout",
            Self::ArtifactMissing => "artifact_missing",
            Self::Setup => "setup",
            Self::Database => "database",
            Self::Io => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_failures_are_classified() {
        let raw = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE),
            Some("UNIQUE constraint failed: chapters.name".into()),
        );
        let err = Error::from(raw);
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
        assert!(err.to_string().contains("chapters.name"));
    }

    #[test]
    fn other_sqlite_failures_stay_database_errors() {
        let err = Error::from(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(err.kind(), ErrorKind::Database);
    }
}
