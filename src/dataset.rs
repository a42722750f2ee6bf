//! Un-materialized handles over one or more files forming one logical table.

use crate::error::{LakeError, Result};
use crate::format::FileFormat;
use crate::io::codec::read_table;
use crate::io::fs::FileSystem;
use crate::partition::NULL_SEGMENT;
use crate::schema::unify_many;
use crate::table::Table;
use arrow::datatypes::Schema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// How directory names below a dataset root map to columns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partitioning {
    /// Directories carry no column values.
    #[default]
    None,
    /// `column=value` directory segments.
    Hive,
    /// The i-th directory level holds the value of the i-th column. A
    /// `column=` prefix on the segment is tolerated and stripped.
    Columns(Vec<String>),
}

impl Partitioning {
    /// Column values encoded in the directories of `relative` (a file path
    /// relative to the dataset root).
    fn values(&self, relative: &str) -> Vec<(String, Option<String>)> {
        let mut dirs: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
        dirs.pop();
        let decode = |v: &str| (v != NULL_SEGMENT).then(|| v.to_string());
        match self {
            Self::None => Vec::new(),
            Self::Hive => dirs
                .into_iter()
                .filter_map(|d| d.split_once('='))
                .map(|(k, v)| (k.to_string(), decode(v)))
                .collect(),
            Self::Columns(names) => names
                .iter()
                .zip(dirs)
                .map(|(name, seg)| {
                    let v = seg.split_once('=').map_or(seg, |(_, v)| v);
                    (name.clone(), decode(v))
                })
                .collect(),
        }
    }
}

/// Reference to the files of a dataset. Creating one lists files but reads no data.
#[derive(Clone)]
pub struct Dataset {
    fs: Arc<dyn FileSystem>,
    root: String,
    format: FileFormat,
    partitioning: Partitioning,
    files: Vec<String>,
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("root", &self.root)
            .field("format", &self.format)
            .field("partitioning", &self.partitioning)
            .field("files", &self.files.len())
            .finish_non_exhaustive()
    }
}

impl Dataset {
    /// Discover the dataset at `root`, a single file or a directory tree.
    ///
    /// Without an explicit `format`, the first file with a known extension decides it.
    ///
    /// # Errors
    /// [`LakeError::SourceNotFound`] if `root` does not exist or holds no file of
    /// the format, [`LakeError::UnsupportedFormat`] if no format can be inferred.
    pub fn open(
        fs: Arc<dyn FileSystem>,
        root: &str,
        format: Option<FileFormat>,
        partitioning: Partitioning,
    ) -> Result<Self> {
        if !fs.exists(root)? {
            return Err(LakeError::SourceNotFound {
                op: "open dataset",
                path: root.to_string(),
            });
        }
        let single_file = fs.is_file(root)?;
        let listed = fs.list_files(root)?;
        let format = match format {
            Some(f) => f,
            None => listed
                .iter()
                .find_map(|p| FileFormat::from_path(p))
                .ok_or_else(|| LakeError::UnsupportedFormat {
                    op: "open dataset",
                    format: format!("<none inferred under {root}>"),
                })?,
        };
        let files: Vec<String> = if single_file {
            listed
        } else {
            listed.into_iter().filter(|p| format.matches_path(p)).collect()
        };
        if files.is_empty() {
            return Err(LakeError::SourceNotFound {
                op: "open dataset",
                path: format!("{root} (no {format} files)"),
            });
        }
        debug!(root, %format, files = files.len(), "opened dataset");
        Ok(Self {
            fs,
            root: root.trim_end_matches('/').to_string(),
            format,
            partitioning,
            files,
        })
    }

    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    #[must_use]
    pub fn format(&self) -> FileFormat {
        self.format
    }

    #[must_use]
    pub fn partitioning(&self) -> &Partitioning {
        &self.partitioning
    }

    #[must_use]
    pub fn files(&self) -> &[String] {
        &self.files
    }

    #[must_use]
    pub fn filesystem(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Read every file and concatenate them into one table.
    ///
    /// Partition columns found in directory names are appended when a file
    /// does not already contain them. Diverging column types across files are
    /// widened with [`unify_many`] before concatenation.
    ///
    /// # Errors
    /// [`LakeError::IngestionFailed`] for codec failures, [`LakeError::SchemaMismatch`]
    /// when files disagree on column names.
    pub fn to_table(&self) -> Result<Table> {
        let mut tables = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let mut table = read_table(self.format, self.fs.read(file)?, file)?;
            for (column, value) in self.partitioning.values(self.relative(file)) {
                if table.schema().index_of(&column).is_err() {
                    table = table.with_constant_column(&column, value.as_deref())?;
                }
            }
            tables.push(table);
        }

        let schemas: Vec<Schema> = tables.iter().map(|t| t.schema().as_ref().clone()).collect();
        let Some((unified, equal)) = unify_many(&schemas)? else {
            return Err(LakeError::SourceNotFound {
                op: "read dataset",
                path: self.root.clone(),
            });
        };
        let unified = Arc::new(unified);
        if !equal {
            debug!(root = %self.root, "file schemas differ, casting to unified schema");
        }
        let tables = tables
            .iter()
            .map(|t| t.cast_to(&unified))
            .collect::<Result<Vec<_>>>()?;
        Table::concat(unified, tables)
    }

    fn relative<'a>(&self, file: &'a str) -> &'a str {
        file.strip_prefix(self.root.as_str())
            .unwrap_or(file)
            .trim_start_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hive_values_from_directories() {
        let values =
            Partitioning::Hive.values("region=EU/day=__HIVE_DEFAULT_PARTITION__/data-0.parquet");
        assert_eq!(
            values,
            vec![("region".into(), Some("EU".into())), ("day".into(), None)]
        );
    }

    #[test]
    fn positional_values_strip_prefixes() {
        let p = Partitioning::Columns(vec!["region".into(), "day".into()]);
        assert_eq!(
            p.values("EU/day=1/x.arrow"),
            vec![("region".into(), Some("EU".into())), ("day".into(), Some("1".into()))]
        );
        assert!(Partitioning::None.values("a=1/x.arrow").is_empty());
    }
}
