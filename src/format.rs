//! On-disk encodings and compression names.

use crate::error::{LakeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// The two supported on-disk encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Row-group columnar encoding (parquet).
    Parquet,
    /// Row-group-free record-batch encoding (arrow IPC file, a.k.a. feather v2).
    Ipc,
}

impl FileFormat {
    /// Strict name lookup. `arrow`, `ipc` and `feather` are aliases of [`FileFormat::Ipc`].
    ///
    /// # Errors
    /// [`LakeError::UnsupportedFormat`] for any other name.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "parquet" | "pq" => Ok(Self::Parquet),
            "arrow" | "ipc" | "feather" => Ok(Self::Ipc),
            other => Err(LakeError::UnsupportedFormat {
                op: "parse format",
                format: other.to_string(),
            }),
        }
    }

    /// Lenient lookup used when writing: IPC aliases map to [`FileFormat::Ipc`],
    /// everything else to [`FileFormat::Parquet`].
    #[must_use]
    pub fn for_write(name: &str) -> Self {
        Self::parse(name).unwrap_or(Self::Parquet)
    }

    /// Infer the encoding from a file extension.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| Self::parse(e).ok())
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Parquet => "parquet",
            Self::Ipc => "arrow",
        }
    }

    /// Whether a file path carries one of this encoding's extensions.
    #[must_use]
    pub fn matches_path(self, path: &str) -> bool {
        Self::from_path(path) == Some(self)
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Parquet => "parquet",
            Self::Ipc => "ipc",
        })
    }
}

/// Compression codec requested for a write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Compression {
    None,
    Snappy,
    Gzip,
    Brotli,
    Lz4,
    Zstd,
}

impl Compression {
    /// Parse a codec name; `None`, `"none"` and `"uncompressed"` mean no compression.
    ///
    /// # Errors
    /// [`LakeError::InvalidArgument`] for unknown codec names.
    pub fn parse(name: Option<&str>) -> Result<Self> {
        let Some(name) = name else {
            return Ok(Self::None);
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "uncompressed" => Ok(Self::None),
            "snappy" => Ok(Self::Snappy),
            "gzip" => Ok(Self::Gzip),
            "brotli" => Ok(Self::Brotli),
            "lz4" | "lz4_frame" | "lz4_raw" => Ok(Self::Lz4),
            "zstd" => Ok(Self::Zstd),
            other => Err(LakeError::invalid(
                "parse compression",
                format!("unknown codec `{other}`"),
            )),
        }
    }
}
