use std::path::Path;

use thiserror::Error;

use crate::types::RowPosition;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Unable to initialize store at '{path}': {source}")]
    InitializationFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Table '{name}' already exists")]
    TableAlreadyExists { name: String },

    #[error("Table '{name}' does not exist")]
    TableDoesNotExist { name: String },

    #[error("Corrupt metadata for table '{table}': {reason}")]
    CorruptMetadata { table: String, reason: String },

    #[error("Corrupt record at position {position} in table '{table}': {reason}")]
    CorruptRecord {
        table: String,
        position: RowPosition,
        reason: String,
    },

    #[error("Invalid schema for table '{table}': {reason}")]
    InvalidSchema { table: String, reason: String },

    #[error("Column '{name}' not found in table '{table}'")]
    ColumnNotFound { name: String, table: String },

    #[error("Row for table '{table}' is missing column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("Row for table '{table}' sets column '{column}' more than once")]
    DuplicateColumn { table: String, column: String },

    #[error("Type mismatch: column '{column}' must have {expected} type")]
    TypeMismatch { column: String, expected: String },

    #[error("Primary key not supported for table '{table}': {reason}")]
    PrimaryKeyUnsupported { table: String, reason: String },

    #[error("Write to '{target}' failed: {source}")]
    WriteFailure {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Read from '{target}' failed: {source}")]
    ReadFailure {
        target: String,
        #[source]
        source: std::io::Error,
    },
}

impl DatabaseError {
    pub fn write_failure(target: &Path, source: impl Into<std::io::Error>) -> Self {
        DatabaseError::WriteFailure {
            target: target.display().to_string(),
            source: source.into(),
        }
    }

    pub fn read_failure(target: &Path, source: impl Into<std::io::Error>) -> Self {
        DatabaseError::ReadFailure {
            target: target.display().to_string(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
