//! Deterministic storage paths for dataset files.
//!
//! A path is built from, in order: the base path, one `column=value` segment
//! per partition column, an optional time-bucket segment, and the base file
//! name with its suffix and extension:
//!
//! ```text
//! lake/events/region=EU/day=2024-01-02/2026-10-15/data-0.parquet
//! ```

use crate::error::Result;
use crate::format::FileFormat;
use crate::io::fs::{FileSystem, join_path};
use crate::partition::PartitionKey;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Granularity of the time-bucket directory segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBucket {
    /// `2024-01-02`
    Day,
    /// `2024-01-02T13-45-07`; no colons so the segment is valid on every filesystem.
    Datetime,
}

impl TimeBucket {
    #[must_use]
    pub fn render(self, at: DateTime<Local>) -> String {
        match self {
            Self::Day => at.format("%Y-%m-%d").to_string(),
            Self::Datetime => at.format("%Y-%m-%dT%H-%M-%S").to_string(),
        }
    }
}

/// What follows the base file name: an optional unique token, then an
/// optional chunk index, e.g. `data-{token}-{index}.parquet`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileSuffix {
    token: Option<String>,
    chunk: Option<usize>,
}

impl FileSuffix {
    /// No suffix; repeated writes reuse the same name.
    #[must_use]
    pub fn plain() -> Self {
        Self::default()
    }

    /// A fresh random hex token, so repeated writes never overwrite each other.
    #[must_use]
    pub fn unique() -> Self {
        Self {
            token: Some(Uuid::new_v4().simple().to_string()),
            chunk: None,
        }
    }

    /// The same token with chunk index `index` appended.
    #[must_use]
    pub fn with_chunk(&self, index: usize) -> Self {
        Self {
            token: self.token.clone(),
            chunk: Some(index),
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

impl fmt::Display for FileSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(token) = &self.token {
            write!(f, "-{token}")?;
        }
        if let Some(index) = self.chunk {
            write!(f, "-{index}")?;
        }
        Ok(())
    }
}

/// Partition columns and the key a file belongs to.
#[derive(Clone, Copy, Debug)]
pub struct PartitionSpec<'a> {
    pub columns: &'a [String],
    pub key: &'a PartitionKey,
}

#[derive(Clone, Debug)]
pub struct PathGenerator {
    fs: Arc<dyn FileSystem>,
    base_name: String,
    time_bucket: Option<TimeBucket>,
}

impl PathGenerator {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        base_name: impl Into<String>,
        time_bucket: Option<TimeBucket>,
    ) -> Self {
        Self {
            fs,
            base_name: base_name.into(),
            time_bucket,
        }
    }

    /// Directory a partition's files go to. On a local filesystem it is
    /// created, with its parents, before returning.
    ///
    /// # Errors
    /// [`LakeError::Storage`](crate::LakeError::Storage) if the directory cannot be created.
    pub fn directory(
        &self,
        base_path: &str,
        partition: Option<PartitionSpec<'_>>,
    ) -> Result<String> {
        let mut segments = vec![base_path.to_string()];
        if let Some(spec) = partition {
            segments.extend(spec.key.segments(spec.columns));
        }
        if let Some(bucket) = self.time_bucket {
            segments.push(bucket.render(Local::now()));
        }
        let dir = join_path(&segments);
        if !self.fs.is_remote() {
            self.fs.create_dir_all(&dir)?;
        }
        Ok(dir)
    }

    /// File path inside `dir`.
    #[must_use]
    pub fn file_path(&self, dir: &str, format: FileFormat, suffix: &FileSuffix) -> String {
        let file = format!("{}{suffix}.{}", self.base_name, format.extension());
        join_path(&[dir, file.as_str()])
    }

    /// [`directory`](Self::directory) followed by [`file_path`](Self::file_path).
    ///
    /// # Errors
    /// See [`directory`](Self::directory).
    pub fn generate_path(
        &self,
        base_path: &str,
        partition: Option<PartitionSpec<'_>>,
        format: FileFormat,
        suffix: &FileSuffix,
    ) -> Result<String> {
        let dir = self.directory(base_path, partition)?;
        Ok(self.file_path(&dir, format, suffix))
    }
}
