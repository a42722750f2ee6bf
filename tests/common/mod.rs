#![allow(dead_code)]

use arrow::array::{ArrayRef, Int32Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use bytes::Bytes;
use lakeshard::Table;
use lakeshard::io::fs::{FileSystem, LocalFileSystem, OutputStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// `id: int32, region: utf8` rows.
pub fn regions_table(rows: &[(i32, &str)]) -> Table {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        Field::new("region", DataType::Utf8, true),
    ]));
    let ids: ArrayRef = Arc::new(Int32Array::from_iter_values(rows.iter().map(|(id, _)| *id)));
    let regions: ArrayRef = Arc::new(StringArray::from_iter_values(rows.iter().map(|(_, r)| *r)));
    Table::from_batch(RecordBatch::try_new(schema, vec![ids, regions]).unwrap())
}

/// `n` rows with ids `0..n`, all in region `EU`.
pub fn sequential_table(n: i32) -> Table {
    let rows: Vec<(i32, &str)> = (0..n).map(|i| (i, "EU")).collect();
    regions_table(&rows)
}

/// Every `id` in `table`, sorted.
pub fn sorted_ids(table: &Table) -> Vec<i32> {
    let mut ids: Vec<i32> = table
        .literal_rows()
        .unwrap()
        .into_iter()
        .map(|row| row[0].as_deref().unwrap().parse().unwrap())
        .collect();
    ids.sort_unstable();
    ids
}

/// Local filesystem that counts whole-file reads.
#[derive(Debug, Default)]
pub struct CountingFileSystem {
    inner: LocalFileSystem,
    reads: AtomicUsize,
}

impl CountingFileSystem {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl FileSystem for CountingFileSystem {
    fn is_remote(&self) -> bool {
        self.inner.is_remote()
    }

    fn exists(&self, path: &str) -> lakeshard::Result<bool> {
        self.inner.exists(path)
    }

    fn is_file(&self, path: &str) -> lakeshard::Result<bool> {
        self.inner.is_file(path)
    }

    fn read(&self, path: &str) -> lakeshard::Result<Bytes> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(path)
    }

    fn open_write(&self, path: &str) -> lakeshard::Result<Box<dyn OutputStream>> {
        self.inner.open_write(path)
    }

    fn create_dir_all(&self, path: &str) -> lakeshard::Result<()> {
        self.inner.create_dir_all(path)
    }

    fn list_files(&self, path: &str) -> lakeshard::Result<Vec<String>> {
        self.inner.list_files(path)
    }
}

pub fn path_str(path: &std::path::Path) -> String {
    path.to_str().unwrap().to_string()
}
