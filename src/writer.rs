//! Writing tables out as partitioned, chunked datasets.
//!
//! [`DatasetWriter::write_dataset`] turns any [`WriteInput`] into a
//! [`Relation`], optionally materializes it as an engine temp table, plans the
//! distinct partition keys and hands each partition's rows to a
//! [`ChunkedTableWriter`], which writes one file per chunk.
//!
//! Files already written when a later write fails stay on storage; the error
//! is then a [`LakeError::PartialWriteFailure`] listing them.

use crate::config::{PartitionColumns, WriterConfig};
use crate::dataset::{Dataset, Partitioning};
use crate::engine::{MemoryEngine, QueryEngine, Relation};
use crate::error::{BoxError, LakeError, Result};
use crate::format::{Compression, FileFormat};
use crate::io::codec::{check_compression, read_csv, write_table};
use crate::io::fs::{FileSystem, with_output_stream};
use crate::partition::{PartitionKey, plan_partitions};
use crate::path::{FileSuffix, PartitionSpec, PathGenerator};
use crate::table::Table;
use arrow::array::RecordBatch;
use arrow::datatypes::FieldRef;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_arrow::schema::{SchemaLike, TracingOptions};
use serde_arrow::to_record_batch;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// In-memory record batches not yet wrapped in a [`Table`].
#[derive(Clone, Debug)]
pub struct DataFrame {
    batches: Vec<RecordBatch>,
}

impl DataFrame {
    #[must_use]
    pub fn from_batches(batches: Vec<RecordBatch>) -> Self {
        Self { batches }
    }

    /// Convert serde records to a single batch. The schema is traced from `T`,
    /// so an empty slice still yields a typed, zero-row frame.
    ///
    /// # Errors
    /// [`LakeError::IngestionFailed`] if `T` cannot be mapped to arrow.
    pub fn from_records<T: Serialize + DeserializeOwned>(rows: &[T]) -> Result<Self> {
        let fields = Vec::<FieldRef>::from_type::<T>(TracingOptions::default())
            .map_err(|e| LakeError::ingestion("trace record schema", "<records>", e))?;
        let batch = to_record_batch(&fields, &rows)
            .map_err(|e| LakeError::ingestion("convert records", "<records>", e))?;
        Ok(Self { batches: vec![batch] })
    }

    /// # Errors
    /// [`LakeError::InvalidArgument`] if the frame has no batches or their schemas differ.
    pub fn into_table(self) -> Result<Table> {
        Table::from_batches(self.batches)
    }
}

/// Anything [`DatasetWriter::write_dataset`] accepts.
#[derive(Clone, Debug)]
pub enum WriteInput {
    Relation(Relation),
    Table(Table),
    Dataset(Dataset),
    Frame(DataFrame),
    /// A parquet, CSV or IPC file path, or any other name the engine can resolve
    /// through `SELECT * FROM '<path>'`.
    Path(String),
}

impl From<Relation> for WriteInput {
    fn from(value: Relation) -> Self {
        Self::Relation(value)
    }
}

impl From<Table> for WriteInput {
    fn from(value: Table) -> Self {
        Self::Table(value)
    }
}

impl From<RecordBatch> for WriteInput {
    fn from(value: RecordBatch) -> Self {
        Self::Table(Table::from_batch(value))
    }
}

impl From<Dataset> for WriteInput {
    fn from(value: Dataset) -> Self {
        Self::Dataset(value)
    }
}

impl From<DataFrame> for WriteInput {
    fn from(value: DataFrame) -> Self {
        Self::Frame(value)
    }
}

impl From<&str> for WriteInput {
    fn from(value: &str) -> Self {
        Self::Path(value.to_string())
    }
}

impl From<String> for WriteInput {
    fn from(value: String) -> Self {
        Self::Path(value)
    }
}

/// Per-call overrides of [`WriterConfig`]. `None` falls back to the config.
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    pub path: Option<String>,
    pub partition_columns: Option<PartitionColumns>,
    pub max_rows: Option<usize>,
    pub format: Option<String>,
    /// `Some("none")` disables compression for this call.
    pub compression: Option<String>,
    pub use_temp_table: Option<bool>,
}

impl WriteOptions {
    #[must_use]
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn partition_by(mut self, columns: impl Into<PartitionColumns>) -> Self {
        self.partition_columns = Some(columns.into());
        self
    }

    #[must_use]
    pub fn max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    #[must_use]
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    #[must_use]
    pub fn use_temp_table(mut self, enabled: bool) -> Self {
        self.use_temp_table = Some(enabled);
        self
    }
}

/// One file produced by a write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: String,
    pub rows: usize,
    pub partition: Option<PartitionKey>,
    pub chunk: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub files: Vec<WrittenFile>,
}

impl WriteSummary {
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.path.as_str()).collect()
    }

    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.files.iter().map(|f| f.rows).sum()
    }
}

/// Fold `error` into a [`LakeError::PartialWriteFailure`] when `written` is
/// non-empty. Files listed by a nested partial failure are kept after `written`.
fn partial_failure(op: &'static str, written: &[WrittenFile], error: LakeError) -> LakeError {
    if written.is_empty() {
        return error;
    }
    let (later, source) = match error {
        LakeError::PartialWriteFailure { written, source, .. } => (written, source),
        other => (Vec::new(), Box::new(other)),
    };
    let mut paths: Vec<String> = written.iter().map(|f| f.path.clone()).collect();
    paths.extend(later);
    LakeError::PartialWriteFailure {
        op,
        completed: paths.len(),
        written: paths,
        source,
    }
}

/// Writes one table as one file, or as `ceil(rows / max_rows)` chunk files.
#[derive(Clone, Debug)]
pub struct ChunkedTableWriter {
    fs: Arc<dyn FileSystem>,
    paths: PathGenerator,
    format: FileFormat,
    compression: Compression,
    unique_file_names: bool,
}

impl ChunkedTableWriter {
    /// `format` is resolved leniently: IPC aliases write IPC, anything else parquet.
    ///
    /// # Errors
    /// [`LakeError::InvalidArgument`] for an unknown compression name, or one
    /// the format cannot encode.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        paths: PathGenerator,
        format: &str,
        compression: Option<&str>,
    ) -> Result<Self> {
        let format = FileFormat::for_write(format);
        let compression = Compression::parse(compression)?;
        check_compression(format, compression)?;
        Ok(Self {
            fs,
            paths,
            format,
            compression,
            unique_file_names: true,
        })
    }

    /// Whether file names carry a random token. Each [`write`](Self::write)
    /// call draws one token and shares it across its chunks.
    #[must_use]
    pub fn unique_file_names(mut self, enabled: bool) -> Self {
        self.unique_file_names = enabled;
        self
    }

    #[must_use]
    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Write `table` below `base_path`. With `max_rows`, rows are split by
    /// offset and slice `i` goes to `{base_name}-{token}-{i}`; a zero-row table
    /// then writes no files.
    ///
    /// # Errors
    /// [`LakeError::InvalidArgument`] if `max_rows` is zero, [`LakeError::WriteFailed`]
    /// for the first failing file, wrapped in [`LakeError::PartialWriteFailure`]
    /// if earlier chunks were written.
    pub fn write(
        &self,
        table: &Table,
        base_path: &str,
        max_rows: Option<usize>,
        partition: Option<PartitionSpec<'_>>,
    ) -> Result<Vec<WrittenFile>> {
        const OP: &str = "write table";
        if max_rows == Some(0) {
            return Err(LakeError::invalid(OP, "max_rows must be at least 1"));
        }
        let dir = self.paths.directory(base_path, partition)?;
        let key = partition.map(|p| p.key);
        let suffix = if self.unique_file_names {
            FileSuffix::unique()
        } else {
            FileSuffix::plain()
        };

        let Some(max_rows) = max_rows else {
            let path = self.paths.file_path(&dir, self.format, &suffix);
            self.write_file(table, &path, key, None)?;
            return Ok(vec![WrittenFile {
                path,
                rows: table.num_rows(),
                partition: key.cloned(),
                chunk: None,
            }]);
        };

        let chunks = table.num_rows().div_ceil(max_rows);
        let mut written = Vec::with_capacity(chunks);
        for i in 0..chunks {
            let slice = table.slice(i * max_rows, max_rows);
            let path = self.paths.file_path(&dir, self.format, &suffix.with_chunk(i));
            if let Err(e) = self.write_file(&slice, &path, key, Some(i)) {
                return Err(partial_failure(OP, &written, e));
            }
            written.push(WrittenFile {
                path,
                rows: slice.num_rows(),
                partition: key.cloned(),
                chunk: Some(i),
            });
        }
        Ok(written)
    }

    fn write_file(
        &self,
        table: &Table,
        path: &str,
        partition: Option<&PartitionKey>,
        chunk: Option<usize>,
    ) -> Result<()> {
        debug!(path, rows = table.num_rows(), format = %self.format, "writing file");
        let failed = |source: BoxError| LakeError::WriteFailed {
            op: "write file",
            path: path.to_string(),
            partition: partition.map(ToString::to_string),
            chunk,
            source,
        };
        with_output_stream(self.fs.as_ref(), path, |out| {
            write_table(self.format, table, out, self.compression).map_err(failed)
        })
        .map_err(|e| match e {
            LakeError::WriteFailed { .. } => e,
            other => failed(Box::new(other)),
        })
    }
}

/// Writes inputs as datasets under [`WriterConfig::base_path`].
#[derive(Clone, Debug)]
pub struct DatasetWriter {
    config: WriterConfig,
    fs: Arc<dyn FileSystem>,
    engine: Arc<dyn QueryEngine>,
}

impl DatasetWriter {
    /// Writer with its own [`MemoryEngine`] over `fs`.
    #[must_use]
    pub fn new(config: WriterConfig, fs: Arc<dyn FileSystem>) -> Self {
        let engine = Arc::new(MemoryEngine::new(Arc::clone(&fs)));
        Self { config, fs, engine }
    }

    /// Share an engine, e.g. with a [`LazyReader`](crate::reader::LazyReader).
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn QueryEngine>) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<dyn QueryEngine> {
        &self.engine
    }

    /// Write `input` as a dataset.
    ///
    /// With partition columns, one directory per distinct key tuple is written,
    /// each holding only that key's rows. Without, the whole input goes to the
    /// base path.
    ///
    /// # Errors
    /// Ingestion errors for the input, [`LakeError::InvalidArgument`] for bad
    /// options, [`LakeError::WriteFailed`] or [`LakeError::PartialWriteFailure`]
    /// for storage failures.
    pub fn write_dataset(
        &self,
        input: impl Into<WriteInput>,
        options: &WriteOptions,
    ) -> Result<WriteSummary> {
        const OP: &str = "write dataset";
        let config = &self.config;
        let base_path = options.path.as_deref().unwrap_or(&config.base_path);
        if base_path.is_empty() {
            return Err(LakeError::invalid(OP, "no base path configured"));
        }
        let columns = options
            .partition_columns
            .as_ref()
            .unwrap_or(&config.partition_columns)
            .as_slice();
        let max_rows = options.max_rows.or(config.max_rows);
        let format = options.format.as_deref().unwrap_or(&config.format);
        let compression = options.compression.as_deref().or(config.compression.as_deref());

        let paths = PathGenerator::new(
            Arc::clone(&self.fs),
            config.base_name.clone(),
            config.time_bucket,
        );
        let writer = ChunkedTableWriter::new(Arc::clone(&self.fs), paths, format, compression)?
            .unique_file_names(config.unique_file_names);

        let relation = self.to_relation(input.into())?;
        let temp_table = if options.use_temp_table.unwrap_or(config.use_temp_table) {
            let name = format!("__lakeshard_write_{}", Uuid::new_v4().simple());
            self.engine.create_or_replace_temp_table(&name, &relation)?;
            Some(name)
        } else {
            None
        };

        let result = match &temp_table {
            Some(name) => self
                .engine
                .query(&format!("SELECT * FROM {name}"))
                .and_then(|r| self.write_relation(&writer, &r, base_path, columns, max_rows)),
            None => self.write_relation(&writer, &relation, base_path, columns, max_rows),
        };
        if let Some(name) = temp_table {
            if let Err(e) = self.engine.drop_table(&name) {
                warn!(table = %name, error = %e, "failed to drop write temp table");
            }
        }

        let summary = result?;
        info!(
            path = base_path,
            files = summary.files.len(),
            rows = summary.total_rows(),
            format = %writer.format(),
            "wrote dataset"
        );
        Ok(summary)
    }

    /// [`write_dataset`](Self::write_dataset) targeting the configured base path,
    /// whatever `options.path` says. With unique file names on, the new files
    /// land next to the existing ones in every partition; with them off, files
    /// of the same partition and chunk are replaced.
    ///
    /// # Errors
    /// See [`write_dataset`](Self::write_dataset).
    pub fn append(
        &self,
        input: impl Into<WriteInput>,
        options: &WriteOptions,
    ) -> Result<WriteSummary> {
        let options = WriteOptions {
            path: None,
            ..options.clone()
        };
        self.write_dataset(input, &options)
    }

    fn write_relation(
        &self,
        writer: &ChunkedTableWriter,
        relation: &Relation,
        base_path: &str,
        columns: &[String],
        max_rows: Option<usize>,
    ) -> Result<WriteSummary> {
        if columns.is_empty() {
            let table = self.engine.relation_to_table(relation)?;
            let files = writer.write(&table, base_path, max_rows, None)?;
            return Ok(WriteSummary { files });
        }

        let keys = plan_partitions(relation, columns)?;
        debug!(partitions = keys.len(), columns = ?columns, "planned partitions");
        let mut files = Vec::new();
        for key in &keys {
            let written = self
                .engine
                .relation_to_table(&relation.clone().filter(key.predicates(columns)))
                .and_then(|table| {
                    let spec = PartitionSpec { columns, key };
                    writer.write(&table, base_path, max_rows, Some(spec))
                });
            match written {
                Ok(mut w) => files.append(&mut w),
                Err(e) => return Err(partial_failure("write dataset", &files, e)),
            }
        }
        Ok(WriteSummary { files })
    }

    fn to_relation(&self, input: WriteInput) -> Result<Relation> {
        match input {
            WriteInput::Relation(r) => Ok(r),
            WriteInput::Table(t) => Ok(Relation::from_table(Arc::new(t))),
            WriteInput::Dataset(d) => Ok(Relation::from_dataset(Arc::new(d))),
            WriteInput::Frame(f) => Ok(Relation::from_table(Arc::new(f.into_table()?))),
            WriteInput::Path(p) => self.ingest_path(&p),
        }
    }

    fn ingest_path(&self, path: &str) -> Result<Relation> {
        let extension = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let open = |format: FileFormat| -> Result<Relation> {
            let dataset =
                Dataset::open(Arc::clone(&self.fs), path, Some(format), Partitioning::None)?;
            Ok(Relation::from_dataset(Arc::new(dataset)))
        };
        match extension.as_deref() {
            Some("parquet") => open(FileFormat::Parquet),
            Some("arrow" | "feather" | "ipc") => open(FileFormat::Ipc),
            Some("csv") => {
                let table = read_csv(self.fs.read(path)?, path)?;
                Ok(Relation::from_table(Arc::new(table)))
            }
            _ => self.engine.query(&format!("SELECT * FROM '{path}'")),
        }
    }
}
