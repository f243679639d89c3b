// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Storage errors from `redb` are folded into [`OptaskError::Storage`] here so
//! that callers of the service never see the raw library types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptaskError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Run not found: task '{task}', run {run}")]
    RunNotFound { task: String, run: String },

    #[error("Log not found: task '{task}', run {run}")]
    LogNotFound { task: String, run: String },

    #[error("Invalid run id: {0}")]
    InvalidRunId(String),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("Encoding error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OptaskError {
    /// True for the "asked for something that does not exist" family.
    ///
    /// Front-ends map these to a 404-style response and everything else to a
    /// 500-style one.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            OptaskError::TaskNotFound(_)
                | OptaskError::RunNotFound { .. }
                | OptaskError::LogNotFound { .. }
        )
    }
}

macro_rules! storage_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for OptaskError {
                fn from(err: $ty) -> Self {
                    OptaskError::Storage(redb::Error::from(err))
                }
            }
        )*
    };
}

storage_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

pub type Result<T> = std::result::Result<T, OptaskError>;
