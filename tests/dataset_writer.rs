mod common;

use arrow::array::{ArrayRef, Int32Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use chrono::Local;
use common::{path_str, regions_table, sequential_table, sorted_ids};
use lakeshard::config::{Partitioning, ReaderConfig, TimeBucket, WriterConfig};
use lakeshard::engine::{MemoryEngine, QueryEngine, Relation, RelationSource};
use lakeshard::io::cloud::{FakeObjectIO, ObjectStoreFileSystem, StaticCredentials};
use lakeshard::io::codec::read_table;
use lakeshard::io::fs::{FileSystem, LocalFileSystem};
use lakeshard::writer::{DataFrame, DatasetWriter, WriteOptions};
use lakeshard::{FileFormat, LakeError, LazyReader, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

fn writer(base: &str) -> DatasetWriter {
    DatasetWriter::new(WriterConfig::new(base), Arc::new(LocalFileSystem::new()))
}

fn read_file(path: &str) -> anyhow::Result<Table> {
    let format = FileFormat::from_path(path).expect("known extension");
    Ok(read_table(format, LocalFileSystem::new().read(path)?, path)?)
}

fn read_tree(path: &str, partitioning: Partitioning) -> anyhow::Result<Arc<Table>> {
    let mut config = ReaderConfig::new(path);
    config.partitioning = partitioning;
    Ok(LazyReader::new(config, Arc::new(LocalFileSystem::new())).table()?)
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap()
}

/// `(token, chunk)` of a `data-{token}-{chunk}.parquet` file.
fn token_and_chunk(path: &str) -> (String, usize) {
    let stem = file_name(path)
        .strip_prefix("data-")
        .and_then(|s| s.strip_suffix(".parquet"))
        .unwrap();
    let (token, chunk) = stem.rsplit_once('-').unwrap();
    (token.to_string(), chunk.parse().unwrap())
}

#[test]
fn chunked_write_splits_by_max_rows() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let base = path_str(&tmp.path().join("chunks"));

    let summary = writer(&base)
        .write_dataset(sequential_table(2500), &WriteOptions::default().max_rows(1000))?;

    let rows: Vec<usize> = summary.files.iter().map(|f| f.rows).collect();
    assert_eq!(rows, [1000, 1000, 500]);
    let names: Vec<(String, usize)> =
        summary.files.iter().map(|f| token_and_chunk(&f.path)).collect();
    let token = &names[0].0;
    assert_eq!(token.len(), 32);
    assert!(names.iter().all(|(t, _)| t == token));
    assert_eq!(names.iter().map(|(_, i)| *i).collect::<Vec<_>>(), [0, 1, 2]);
    for file in &summary.files {
        assert_eq!(read_file(&file.path)?.num_rows(), file.rows);
    }
    assert_eq!(sorted_ids(&*read_tree(&base, Partitioning::None)?), (0..2500).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn exact_multiple_and_empty_tables() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let base = path_str(&tmp.path().join("exact"));
    let w = writer(&base);

    let summary =
        w.write_dataset(sequential_table(2000), &WriteOptions::default().max_rows(1000))?;
    assert_eq!(summary.files.len(), 2);

    let summary = w.write_dataset(sequential_table(0), &WriteOptions::default().max_rows(1000))?;
    assert!(summary.files.is_empty());

    let err = w
        .write_dataset(sequential_table(3), &WriteOptions::default().max_rows(0))
        .unwrap_err();
    assert!(matches!(err, LakeError::InvalidArgument { .. }));
    Ok(())
}

#[test]
fn region_partitions_get_their_own_directories() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let base = path_str(&tmp.path().join("regions"));
    let table = regions_table(&[(1, "EU"), (2, "US"), (3, "EU"), (4, "US"), (5, "EU")]);

    let summary =
        writer(&base).write_dataset(table, &WriteOptions::default().partition_by("region"))?;

    assert_eq!(summary.files.len(), 2);
    let eu = summary.files.iter().find(|f| f.path.contains("/region=EU/")).expect("EU file");
    let us = summary.files.iter().find(|f| f.path.contains("/region=US/")).expect("US file");
    assert_eq!((eu.rows, us.rows), (3, 2));
    assert!(file_name(&eu.path).starts_with("data-"));
    assert_eq!(sorted_ids(&read_file(&eu.path)?), [1, 3, 5]);

    let back = read_tree(&base, Partitioning::Hive)?;
    assert_eq!(back.num_rows(), 5);
    assert_eq!(sorted_ids(&back), [1, 2, 3, 4, 5]);
    Ok(())
}

fn events(rows: &[(i32, &str, Option<&str>)]) -> Table {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        Field::new("region", DataType::Utf8, false),
        Field::new("day", DataType::Utf8, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.0))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.1))),
        Arc::new(StringArray::from(rows.iter().map(|r| r.2).collect::<Vec<_>>())),
    ];
    Table::from_batch(RecordBatch::try_new(schema, columns).unwrap())
}

fn sorted_rows(table: &Table) -> anyhow::Result<Vec<Vec<Option<String>>>> {
    let mut rows = table.literal_rows()?;
    rows.sort();
    Ok(rows)
}

#[test]
fn multi_column_partitions_round_trip() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let base = path_str(&tmp.path().join("events"));
    let input = events(&[
        (1, "EU", Some("2024-01-01")),
        (2, "EU", Some("2024-01-02")),
        (3, "US", Some("2024-01-01")),
        (4, "EU", Some("2024-01-01")),
        (5, "US", None),
        (6, "APAC", Some("2024-01-02")),
    ]);

    let options = WriteOptions::default().partition_by(["region", "day"]);
    let summary = writer(&base).write_dataset(input.clone(), &options)?;
    assert_eq!(summary.files.len(), 5);
    assert_eq!(summary.total_rows(), 6);
    assert!(
        summary
            .paths()
            .iter()
            .any(|p| p.contains("/region=US/day=__HIVE_DEFAULT_PARTITION__/"))
    );

    let back = read_tree(&base, Partitioning::None)?;
    assert_eq!(sorted_rows(&back)?, sorted_rows(&input)?);
    Ok(())
}

#[test]
fn repeated_unpartitioned_writes_do_not_collide() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let base = path_str(&tmp.path().join("plain"));
    let w = writer(&base);

    let first = w.write_dataset(sequential_table(3), &WriteOptions::default())?;
    let second = w.write_dataset(sequential_table(3), &WriteOptions::default())?;
    assert_ne!(first.files[0].path, second.files[0].path);
    assert_eq!(read_tree(&base, Partitioning::None)?.num_rows(), 6);

    let mut config = WriterConfig::new(path_str(&tmp.path().join("overwrite")));
    config.unique_file_names = false;
    let w = DatasetWriter::new(config, Arc::new(LocalFileSystem::new()));
    let first = w.write_dataset(sequential_table(3), &WriteOptions::default())?;
    let second = w.write_dataset(sequential_table(4), &WriteOptions::default())?;
    assert_eq!(first.files[0].path, second.files[0].path);
    assert_eq!(read_file(&second.files[0].path)?.num_rows(), 4);
    Ok(())
}

#[test]
fn append_always_targets_the_configured_base() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let base = path_str(&tmp.path().join("base"));
    let elsewhere = path_str(&tmp.path().join("elsewhere"));
    let w = writer(&base);

    w.write_dataset(sequential_table(2), &WriteOptions::default())?;
    let appended = w.append(sequential_table(5), &WriteOptions::default().at(&elsewhere))?;
    assert!(appended.files[0].path.starts_with(&base));
    assert!(!tmp.path().join("elsewhere").exists());
    assert_eq!(read_tree(&base, Partitioning::None)?.num_rows(), 7);
    Ok(())
}

#[test]
fn partitioned_append_keeps_earlier_files() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let base = path_str(&tmp.path().join("appended"));
    let w = writer(&base);
    let options = WriteOptions::default().partition_by("region");

    let first = w.write_dataset(regions_table(&[(1, "EU"), (2, "EU")]), &options)?;
    let second = w.append(regions_table(&[(3, "EU"), (4, "US")]), &options)?;

    let eu_files: BTreeSet<&str> = first
        .paths()
        .into_iter()
        .chain(second.paths())
        .filter(|p| p.contains("/region=EU/"))
        .collect();
    assert_eq!(eu_files.len(), 2);
    assert_eq!(sorted_ids(&*read_tree(&base, Partitioning::Hive)?), [1, 2, 3, 4]);
    Ok(())
}

#[test]
fn chunked_append_keeps_earlier_chunks() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let base = path_str(&tmp.path().join("chunked_append"));
    let w = writer(&base);
    let options = WriteOptions::default().max_rows(2);

    let first = w.write_dataset(sequential_table(4), &options)?;
    let second = w.append(regions_table(&[(10, "EU")]), &options)?;

    let (first_token, _) = token_and_chunk(&first.files[0].path);
    let (second_token, chunk) = token_and_chunk(&second.files[0].path);
    assert_ne!(first_token, second_token);
    assert_eq!(chunk, 0);
    assert_eq!(sorted_ids(&*read_tree(&base, Partitioning::None)?), [0, 1, 2, 3, 10]);
    Ok(())
}

#[test]
fn plain_names_replace_matching_partition_files() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut config = WriterConfig::new(path_str(&tmp.path().join("replaced")));
    config.unique_file_names = false;
    let w = DatasetWriter::new(config, Arc::new(LocalFileSystem::new()));
    let options = WriteOptions::default().partition_by("region").max_rows(2);

    let first = w.write_dataset(regions_table(&[(1, "EU"), (2, "EU"), (3, "EU")]), &options)?;
    assert!(first.paths()[0].ends_with("/region=EU/data-0.parquet"));
    w.append(regions_table(&[(4, "EU")]), &options)?;

    let ids = sorted_ids(&*read_tree(w.config().base_path.as_str(), Partitioning::Hive)?);
    assert_eq!(ids, [3, 4]);
    Ok(())
}

#[test]
fn ipc_format_with_compression() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let base = path_str(&tmp.path().join("ipc"));
    let options = WriteOptions::default().format("feather").compression("lz4").max_rows(2);

    let summary = writer(&base).write_dataset(sequential_table(5), &options)?;
    assert_eq!(summary.files.len(), 3);
    assert!(summary.files.iter().all(|f| f.path.ends_with(".arrow")));
    assert_eq!(sorted_ids(&*read_tree(&base, Partitioning::None)?), [0, 1, 2, 3, 4]);

    let err = writer(&base)
        .write_dataset(sequential_table(1), &WriteOptions::default().compression("lzma"))
        .unwrap_err();
    assert!(matches!(err, LakeError::InvalidArgument { .. }));
    Ok(())
}

#[test]
fn ipc_codecs_are_checked_before_any_file_is_created() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let base = path_str(&tmp.path().join("ipc_snappy"));

    for codec in ["snappy", "gzip", "brotli"] {
        let options = WriteOptions::default().format("ipc").compression(codec);
        let err = writer(&base).write_dataset(sequential_table(3), &options).unwrap_err();
        assert!(matches!(err, LakeError::InvalidArgument { .. }), "{codec}: {err}");
    }
    assert!(!Path::new(&base).exists());

    // Parquet encodes the same codec.
    let options = WriteOptions::default().compression("snappy");
    writer(&base).write_dataset(sequential_table(3), &options)?;
    assert_eq!(read_tree(&base, Partitioning::None)?.num_rows(), 3);
    Ok(())
}

#[test]
fn unknown_format_names_fall_back_to_parquet() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let base = path_str(&tmp.path().join("fallback"));
    let summary =
        writer(&base).write_dataset(sequential_table(1), &WriteOptions::default().format("orc"))?;
    assert!(summary.files[0].path.ends_with(".parquet"));
    Ok(())
}

#[test]
fn time_bucket_adds_a_date_segment() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut config = WriterConfig::new(path_str(&tmp.path().join("bucketed")));
    config.time_bucket = Some(TimeBucket::Day);
    let w = DatasetWriter::new(config, Arc::new(LocalFileSystem::new()));

    let today = Local::now().format("%Y-%m-%d").to_string();
    let options = WriteOptions::default().partition_by("region");
    let summary = w.write_dataset(regions_table(&[(1, "EU")]), &options)?;
    assert!(summary.files[0].path.contains(&format!("/region=EU/{today}/data-")));
    Ok(())
}

#[test]
fn csv_paths_are_ingested() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let csv = tmp.path().join("in.csv");
    std::fs::write(&csv, "id,region\n1,EU\n2,US\n3,EU\n")?;
    let base = path_str(&tmp.path().join("from_csv"));

    let options = WriteOptions::default().partition_by("region");
    let summary = writer(&base).write_dataset(path_str(&csv), &options)?;
    assert_eq!(summary.files.len(), 2);
    assert_eq!(read_tree(&base, Partitioning::Hive)?.num_rows(), 3);
    Ok(())
}

#[test]
fn parquet_paths_are_ingested_as_datasets() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = path_str(&tmp.path().join("source"));
    let first = writer(&source).write_dataset(sequential_table(4), &WriteOptions::default())?;

    let copy = path_str(&tmp.path().join("copy"));
    let summary =
        writer(&copy).write_dataset(first.files[0].path.as_str(), &WriteOptions::default())?;
    assert_eq!(summary.total_rows(), 4);

    let err = writer(&copy)
        .write_dataset(path_str(&tmp.path().join("missing.parquet")), &WriteOptions::default())
        .unwrap_err();
    assert!(matches!(err, LakeError::SourceNotFound { .. }));
    Ok(())
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Reading {
    sensor: String,
    value: f64,
}

#[test]
fn serde_records_can_be_written() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let base = path_str(&tmp.path().join("records"));
    let frame = DataFrame::from_records(&[
        Reading { sensor: "a".into(), value: 1.5 },
        Reading { sensor: "b".into(), value: 2.0 },
        Reading { sensor: "a".into(), value: 0.5 },
    ])?;

    let summary =
        writer(&base).write_dataset(frame, &WriteOptions::default().partition_by("sensor"))?;
    let rows: Vec<usize> = {
        let mut rows: Vec<usize> = summary.files.iter().map(|f| f.rows).collect();
        rows.sort_unstable();
        rows
    };
    assert_eq!(rows, [1, 2]);
    Ok(())
}

#[test]
fn write_temp_tables_are_dropped() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let w = writer(&path_str(&tmp.path().join("temp")));
    let options = WriteOptions::default().partition_by("region");
    w.write_dataset(regions_table(&[(1, "EU"), (2, "US")]), &options)?;
    assert!(w.engine().table_names()?.is_empty());

    w.write_dataset(sequential_table(2), &WriteOptions::default().use_temp_table(false))?;
    assert!(w.engine().table_names()?.is_empty());
    Ok(())
}

#[test]
fn unknown_partition_column_fails_before_writing() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let base = tmp.path().join("bad");
    let err = writer(&path_str(&base))
        .write_dataset(sequential_table(2), &WriteOptions::default().partition_by("country"))
        .unwrap_err();
    assert!(matches!(err, LakeError::Query { .. }));
    assert!(!base.exists());
    Ok(())
}

/// Delegates to a [`MemoryEngine`] but can never drop a table.
#[derive(Debug)]
struct UndroppableEngine(MemoryEngine);

impl QueryEngine for UndroppableEngine {
    fn register(&self, name: &str, source: RelationSource) -> lakeshard::Result<()> {
        self.0.register(name, source)
    }

    fn create_or_replace_temp_table(
        &self,
        name: &str,
        relation: &Relation,
    ) -> lakeshard::Result<()> {
        self.0.create_or_replace_temp_table(name, relation)
    }

    fn query(&self, sql: &str) -> lakeshard::Result<Relation> {
        self.0.query(sql)
    }

    fn table_names(&self) -> lakeshard::Result<BTreeSet<String>> {
        self.0.table_names()
    }

    fn drop_table(&self, name: &str) -> lakeshard::Result<()> {
        Err(LakeError::query("drop table", format!("`{name}` is locked")))
    }
}

#[test]
fn failed_temp_table_cleanup_keeps_the_write_result() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let base = path_str(&tmp.path().join("sticky"));
    let fs = Arc::new(LocalFileSystem::new());
    let engine = Arc::new(UndroppableEngine(MemoryEngine::new(fs.clone())));
    let w = DatasetWriter::new(WriterConfig::new(&base), fs).with_engine(engine.clone());

    let options = WriteOptions::default().partition_by("region");
    let summary = w.write_dataset(regions_table(&[(1, "EU"), (2, "US"), (3, "EU")]), &options)?;
    assert_eq!(summary.total_rows(), 3);
    assert_eq!(engine.table_names()?.len(), 1);

    let store = FakeObjectIO::new();
    let creds = StaticCredentials::new("AKIAEXAMPLE", "secret");
    let bucket = Arc::new(ObjectStoreFileSystem::new(Arc::new(store.clone()), "lake", &creds)?);
    let engine = Arc::new(UndroppableEngine(MemoryEngine::new(bucket.clone())));
    let w = DatasetWriter::new(WriterConfig::new("s3://lake/sticky"), bucket).with_engine(engine);

    store.fail_puts_after(1);
    let err = w
        .write_dataset(regions_table(&[(1, "EU"), (2, "US")]), &options)
        .unwrap_err();
    assert!(matches!(err, LakeError::PartialWriteFailure { completed: 1, .. }), "got {err}");

    store.fail_puts_after(0);
    let err = w.write_dataset(sequential_table(2), &WriteOptions::default()).unwrap_err();
    assert!(matches!(err, LakeError::WriteFailed { .. }), "got {err}");
    Ok(())
}
