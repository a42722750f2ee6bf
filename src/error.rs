//! Error taxonomy shared by every lakeshard operation.
//!
//! Each variant names the operation that failed (`op`) and the path, column or
//! value that caused it. Codec and storage failures are kept verbatim as the
//! error source.

use std::error::Error as StdError;
use thiserror::Error;

/// Boxed codec/storage error kept as an error source without reinterpretation.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

pub type Result<T, E = LakeError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum LakeError {
    /// Two schemas handed to unification do not share the same column names.
    #[error("{op}: schemas disagree on column `{column}`")]
    SchemaMismatch { op: &'static str, column: String },

    #[error("{op}: source not found: {path}")]
    SourceNotFound { op: &'static str, path: String },

    #[error("{op}: unsupported format `{format}`")]
    UnsupportedFormat { op: &'static str, format: String },

    /// A codec or storage failure while reading data.
    #[error("{op}: ingestion failed for {path}: {source}")]
    IngestionFailed {
        op: &'static str,
        path: String,
        #[source]
        source: BoxError,
    },

    /// A single file write failed.
    #[error(
        "{op}: writing {path} failed{}: {source}",
        describe_slice(partition.as_deref(), *chunk)
    )]
    WriteFailed {
        op: &'static str,
        path: String,
        partition: Option<String>,
        chunk: Option<usize>,
        #[source]
        source: BoxError,
    },

    /// A multi-file write failed after `completed` files were already on disk.
    /// Those files are not removed.
    #[error("{op}: {completed} file(s) written before failure: {source}")]
    PartialWriteFailure {
        op: &'static str,
        completed: usize,
        written: Vec<String>,
        #[source]
        source: Box<LakeError>,
    },

    #[error("{op}: storage error at {path}: {source}")]
    Storage {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{op}: query failed: {message}")]
    Query { op: &'static str, message: String },

    #[error("{op}: invalid argument: {message}")]
    InvalidArgument { op: &'static str, message: String },

    #[error("{op}: configuration error: {message}")]
    Config { op: &'static str, message: String },
}

fn describe_slice(partition: Option<&str>, chunk: Option<usize>) -> String {
    match (partition, chunk) {
        (Some(p), Some(c)) => format!(" (partition {p}, chunk {c})"),
        (Some(p), None) => format!(" (partition {p})"),
        (None, Some(c)) => format!(" (chunk {c})"),
        (None, None) => String::new(),
    }
}

impl LakeError {
    pub fn ingestion(
        op: &'static str,
        path: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::IngestionFailed {
            op,
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn storage(op: &'static str, path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Storage {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn query(op: &'static str, message: impl Into<String>) -> Self {
        Self::Query {
            op,
            message: message.into(),
        }
    }

    pub fn invalid(op: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            op,
            message: message.into(),
        }
    }

    /// The operation name carried by this error.
    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            Self::SchemaMismatch { op, .. }
            | Self::SourceNotFound { op, .. }
            | Self::UnsupportedFormat { op, .. }
            | Self::IngestionFailed { op, .. }
            | Self::WriteFailed { op, .. }
            | Self::PartialWriteFailure { op, .. }
            | Self::Storage { op, .. }
            | Self::Query { op, .. }
            | Self::InvalidArgument { op, .. }
            | Self::Config { op, .. } => *op,
        }
    }
}
