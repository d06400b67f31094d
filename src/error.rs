// Showcache Error Types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Incomplete episode: {0}")]
    IncompleteEpisode(String),

    #[error("Invalid value for {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("View {view} has no column {column}")]
    UnknownColumn { view: &'static str, column: String },

    #[error("Column {column}: {reason}")]
    Column { column: String, reason: String },

    #[error("Cache not initialized at {}", .0.display())]
    NotInitialized(PathBuf),

    #[error("Cache schema version {found} is newer than this build supports (max {supported})")]
    SchemaTooNew { found: u32, supported: u32 },

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl CacheError {
    /// True for the uniqueness-violation condition callers are expected to tolerate.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, CacheError::AlreadyExists(_))
    }
}

/// Classify a rusqlite failure, turning uniqueness violations into `AlreadyExists`.
pub(crate) fn classify(err: rusqlite::Error, what: impl FnOnce() -> String) -> CacheError {
    if let rusqlite::Error::SqliteFailure(ref code, _) = err {
        if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            || code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        {
            return CacheError::AlreadyExists(what());
        }
    }
    CacheError::Database(err)
}

pub type Result<T> = std::result::Result<T, CacheError>;
