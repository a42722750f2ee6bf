//! # lakeshard
//!
//! Partitioned, chunked columnar **datasets** on local disk or object storage,
//! with **schema unification** across files and a **lazy, tiered reader** that
//! consults a query engine's temp tables before touching storage.
//!
//! ## Key Features
//!
//! - **Schema unification** - merge two schemas column by column, widening types
//!   through a [`TypeRankTable`](schema::TypeRankTable)
//! - **Partitioned writes** - one `column=value` directory per distinct key tuple
//! - **Chunked files** - split large tables into files of at most `max_rows` rows
//! - **Collision-free paths** - optional time buckets and unique file suffixes
//! - **Parquet and Arrow IPC** - with parquet or IPC compression codecs
//! - **Object storage** - any [`ObjectIO`](io::cloud::ObjectIO) bucket acts as a filesystem
//! - **Lazy reads** - unloaded, dataset and table tiers, each loaded once
//!
//! ## Quick Start
//!
//! ```no_run
//! use lakeshard::config::{ReaderConfig, WriterConfig};
//! use lakeshard::io::fs::LocalFileSystem;
//! use lakeshard::reader::LazyReader;
//! use lakeshard::writer::{DatasetWriter, WriteOptions};
//! use std::sync::Arc;
//!
//! # fn main() -> lakeshard::Result<()> {
//! let fs = Arc::new(LocalFileSystem::new());
//! let writer = DatasetWriter::new(WriterConfig::new("lake/events"), fs.clone());
//! writer.write_dataset("raw/events.csv", &WriteOptions::default().partition_by("region"))?;
//!
//! let mut reader = LazyReader::new(ReaderConfig::new("lake/events"), fs);
//! let table = reader.table()?;
//! println!("{} rows", table.num_rows());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`schema`] - Type ranks and schema unification
//! - [`table`] - Materialized arrow tables and equality predicates
//! - [`dataset`] - Un-materialized file sets with partition discovery
//! - [`engine`] - Query-engine seam, deferred relations and the in-memory engine
//! - [`path`] - Storage path generation
//! - [`partition`] - Partition key planning
//! - [`writer`] - Chunked table writer and dataset writer
//! - [`reader`] - Lazy tiered reader
//! - [`io`] - Filesystems, object stores and file codecs
//! - [`config`] - Writer and reader settings

pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod format;
pub mod io;
pub mod partition;
pub mod path;
pub mod reader;
pub mod schema;
pub mod table;
pub mod writer;

pub use error::{LakeError, Result};
pub use format::{Compression, FileFormat};
pub use reader::{LazyReader, Tier};
pub use schema::{unify, unify_many};
pub use table::{Predicate, Table};
pub use writer::{DatasetWriter, WriteInput, WriteOptions, WriteSummary};
