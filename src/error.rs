//! Library error type.
//!
//! Only conditions that must abort a cleanup surface here. Unknown columns,
//! columns without a code table and years missing from a column's name list
//! are handled in place and never produce an error.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CleanupError {
    /// The column publishes code tables, but not for the requested year.
    #[error("No code table for column '{column}' in year {year} ({path:?})")]
    MissingCodeTable {
        column: String,
        year: u16,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("I/O error on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed delimited data in {path:?}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Malformed YAML in {path:?}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid column descriptor {path:?}: {message}")]
    InvalidDescriptor { path: PathBuf, message: String },
    #[error("Invalid code table {path:?} (line {line}): {message}")]
    InvalidCodeTable {
        path: PathBuf,
        line: u64,
        message: String,
    },
    #[error("Column '{column}' has {found} value(s), expected {expected}")]
    ShapeMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("Unknown language '{0}' (expected 'ja' or 'en')")]
    UnknownLanguage(String),
    #[error("Unknown encoding '{0}'")]
    UnknownEncoding(String),
    #[error("Text cannot be encoded as {encoding} for {path:?}")]
    Encoding {
        path: PathBuf,
        encoding: &'static str,
    },
}

impl CleanupError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CleanupError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        CleanupError::Csv {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CleanupError>;
