//! Error types for the AlloyDB checkpoint saver
//!
//! Database errors are never retried or rewritten here; they reach the caller
//! with the original [`sqlx::Error`] kept as the source.

use langgraph_checkpoint::CheckpointError;
use thiserror::Error;

/// Result type for AlloyDB saver operations
pub type Result<T> = std::result::Result<T, AlloyDBError>;

/// Errors raised by the AlloyDB engine and saver
#[derive(Debug, Error)]
pub enum AlloyDBError {
    /// A checkpoint table is missing required columns
    #[error(
        "Table {schema}.{table} has incorrect schema. Got column names {found:?} but required column names {required:?} (missing {missing:?}).\nPlease create table with following schema:\n{expected_ddl}"
    )]
    SchemaMismatch {
        table: String,
        schema: String,
        found: Vec<String>,
        required: Vec<String>,
        missing: Vec<String>,
        expected_ddl: String,
    },

    /// Engine configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error surfaced by the database driver
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Error from checkpoint encoding or validation
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

impl AlloyDBError {
    /// Check if this is a schema mismatch
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, AlloyDBError::SchemaMismatch { .. })
    }

    /// Columns missing from the table, empty for other errors
    pub fn missing_columns(&self) -> &[String] {
        match self {
            AlloyDBError::SchemaMismatch { missing, .. } => missing,
            _ => &[],
        }
    }
}

impl From<serde_json::Error> for AlloyDBError {
    fn from(err: serde_json::Error) -> Self {
        AlloyDBError::Checkpoint(CheckpointError::Serialization(err))
    }
}

impl From<AlloyDBError> for CheckpointError {
    fn from(err: AlloyDBError) -> Self {
        match err {
            AlloyDBError::Checkpoint(inner) => inner,
            other => CheckpointError::backend(other),
        }
    }
}
