//! Writer and reader configuration.
//!
//! Both structs have public fields and a [`Default`], and can be loaded from
//! JSON. Missing JSON fields take their default value.
//!
//! ```
//! use lakeshard::config::WriterConfig;
//!
//! let config = WriterConfig::from_json_str(
//!     r#"{"base_path": "lake/events", "partition_columns": "region"}"#,
//! )?;
//! assert_eq!(config.partition_columns.as_slice(), ["region"]);
//! assert_eq!(config.format, "parquet");
//! # Ok::<(), lakeshard::LakeError>(())
//! ```

use crate::error::{LakeError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use crate::dataset::Partitioning;
pub use crate::partition::PartitionColumns;
pub use crate::path::TimeBucket;

/// Defaults for [`DatasetWriter`](crate::writer::DatasetWriter); each can be
/// overridden per call through [`WriteOptions`](crate::writer::WriteOptions).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Root the dataset is written under. Also the target of `append`.
    pub base_path: String,
    /// File stem; chunk and uniqueness suffixes are appended to it.
    pub base_name: String,
    /// Columns to fan the write out over. Empty means unpartitioned.
    pub partition_columns: PartitionColumns,
    /// Adds a time directory segment below the partition segments.
    pub time_bucket: Option<TimeBucket>,
    /// Encoding name; anything other than an IPC alias writes parquet.
    pub format: String,
    /// Codec name, or `None` for uncompressed files.
    pub compression: Option<String>,
    /// Split each written table into files of at most this many rows.
    pub max_rows: Option<usize>,
    /// Materialize the input as an engine temp table before planning partitions.
    pub use_temp_table: bool,
    /// Give single-file unpartitioned writes a random suffix so they never overwrite.
    pub unique_file_names: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            base_name: "data".to_string(),
            partition_columns: PartitionColumns::default(),
            time_bucket: None,
            format: "parquet".to_string(),
            compression: Some("zstd".to_string()),
            max_rows: None,
            use_temp_table: true,
            unique_file_names: true,
        }
    }
}

impl WriterConfig {
    #[must_use]
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    /// # Errors
    /// [`LakeError::Config`] if the JSON does not describe a writer config.
    pub fn from_json_str(json: &str) -> Result<Self> {
        parse_json("load writer config", json)
    }

    /// # Errors
    /// [`LakeError::Storage`] if the file cannot be read, [`LakeError::Config`]
    /// if it does not parse.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        read_json("load writer config", path.as_ref())
    }
}

/// Settings for [`LazyReader`](crate::reader::LazyReader).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// File or directory to read.
    pub path: String,
    /// Encoding name; `None` infers it from file extensions.
    pub format: Option<String>,
    pub partitioning: Partitioning,
    /// Engine temp table consulted before going to storage.
    pub cache_name: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            format: None,
            partitioning: Partitioning::None,
            cache_name: "temp_table".to_string(),
        }
    }
}

impl ReaderConfig {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// # Errors
    /// [`LakeError::Config`] if the JSON does not describe a reader config.
    pub fn from_json_str(json: &str) -> Result<Self> {
        parse_json("load reader config", json)
    }

    /// # Errors
    /// [`LakeError::Storage`] if the file cannot be read, [`LakeError::Config`]
    /// if it does not parse.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        read_json("load reader config", path.as_ref())
    }
}

fn parse_json<T: DeserializeOwned>(op: &'static str, json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|e| LakeError::Config {
        op,
        message: e.to_string(),
    })
}

fn read_json<T: DeserializeOwned>(op: &'static str, path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .map_err(|e| LakeError::storage(op, path.display().to_string(), e))?;
    parse_json(op, &text)
}
