//! Tiered, lazily loaded access to a stored dataset.
//!
//! A [`LazyReader`] starts [`Tier::Unloaded`]. Asking for the dataset handle
//! lists files ([`Tier::Dataset`]); asking for the table reads them
//! ([`Tier::Table`]). Each tier is loaded at most once per set of load
//! parameters, and every load registers the result with the query engine as
//! `dataset` or `table`.
//!
//! Before going to storage, a table load checks the engine for a temp table
//! named after [`ReaderConfig::cache_name`] and materializes that instead.

use crate::config::{Partitioning, ReaderConfig};
use crate::dataset::Dataset;
use crate::engine::{MemoryEngine, QueryEngine, Relation, RelationSource};
use crate::error::{LakeError, Result};
use crate::format::FileFormat;
use crate::io::codec::read_table;
use crate::io::fs::FileSystem;
use crate::table::{Predicate, Table};
use std::sync::Arc;
use tracing::debug;

/// Engine name of the registered dataset handle.
pub const DATASET_SOURCE: &str = "dataset";
/// Engine name of the registered materialized table.
pub const TABLE_SOURCE: &str = "table";

/// How much of the data a [`LazyReader`] holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Unloaded,
    Dataset,
    Table,
}

/// Parameters for [`LazyReader::table_with`]. Supplying any forces a reload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Temp table to consult instead of [`ReaderConfig::cache_name`].
    pub cache_name: Option<String>,
    /// Keep only these columns, in this order.
    pub columns: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct LazyReader {
    config: ReaderConfig,
    fs: Arc<dyn FileSystem>,
    engine: Arc<dyn QueryEngine>,
    tier: Tier,
    registered: bool,
    dataset: Option<Arc<Dataset>>,
    table: Option<Arc<Table>>,
}

impl LazyReader {
    /// Reader with its own [`MemoryEngine`] over `fs`. Nothing is read yet.
    #[must_use]
    pub fn new(config: ReaderConfig, fs: Arc<dyn FileSystem>) -> Self {
        let engine = Arc::new(MemoryEngine::new(Arc::clone(&fs)));
        Self {
            config,
            fs,
            engine,
            tier: Tier::Unloaded,
            registered: false,
            dataset: None,
            table: None,
        }
    }

    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn QueryEngine>) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<dyn QueryEngine> {
        &self.engine
    }

    #[must_use]
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Whether anything has been registered with the engine yet.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// The dataset handle, discovered on first use.
    ///
    /// # Errors
    /// [`LakeError::SourceNotFound`] or [`LakeError::UnsupportedFormat`] from discovery.
    pub fn dataset(&mut self) -> Result<Arc<Dataset>> {
        match self.dataset.clone() {
            Some(dataset) => Ok(dataset),
            None => self.load_dataset(),
        }
    }

    /// Rediscover the dataset with a different partitioning. The cached table
    /// no longer matches the handle and is dropped.
    ///
    /// # Errors
    /// See [`dataset`](Self::dataset).
    pub fn dataset_with(&mut self, partitioning: Partitioning) -> Result<Arc<Dataset>> {
        self.config.partitioning = partitioning;
        if self.table.take().is_some() {
            self.tier = Tier::Dataset;
        }
        self.load_dataset()
    }

    /// The materialized table, read on first use and cached afterwards.
    ///
    /// # Errors
    /// [`LakeError::SourceNotFound`], [`LakeError::UnsupportedFormat`] or
    /// [`LakeError::IngestionFailed`] from reading the data.
    pub fn table(&mut self) -> Result<Arc<Table>> {
        if let Some(table) = &self.table {
            debug!(path = %self.config.path, "table cache hit");
            return Ok(Arc::clone(table));
        }
        self.load_table(&LoadOptions::default())
    }

    /// Reload the table with `options`, replacing any cached table.
    ///
    /// # Errors
    /// See [`table`](Self::table); [`LakeError::Query`] for unknown columns.
    pub fn table_with(&mut self, options: &LoadOptions) -> Result<Arc<Table>> {
        self.load_table(options)
    }

    /// A relation over the best source available: the cache temp table, the
    /// materialized table, or the dataset handle (loading it if needed).
    ///
    /// # Errors
    /// See [`dataset`](Self::dataset).
    pub fn relation(&mut self) -> Result<Relation> {
        if self.engine.table_names()?.contains(&self.config.cache_name) {
            return self.engine.query(&format!("SELECT * FROM {}", self.config.cache_name));
        }
        match self.table.clone() {
            Some(table) => Ok(Relation::from_table(table)),
            None => Ok(Relation::from_dataset(self.dataset()?)),
        }
    }

    /// Rows matching every predicate.
    ///
    /// # Errors
    /// See [`relation`](Self::relation).
    pub fn filter(&mut self, predicates: Vec<Predicate>) -> Result<Relation> {
        Ok(self.relation()?.filter(predicates))
    }

    /// Materialize the current data as temp table `name` (the configured cache
    /// name by default), so later table loads read it instead of storage.
    ///
    /// # Errors
    /// See [`relation`](Self::relation).
    pub fn create_temp_table(&mut self, name: Option<&str>) -> Result<()> {
        let relation = match self.table.clone() {
            Some(table) => Relation::from_table(table),
            None => Relation::from_dataset(self.dataset()?),
        };
        let name = name.unwrap_or(&self.config.cache_name).to_string();
        self.engine.create_or_replace_temp_table(&name, &relation)
    }

    /// Run SQL against the engine this reader registers with.
    ///
    /// # Errors
    /// [`LakeError::Query`] from the engine.
    pub fn query(&self, sql: &str) -> Result<Relation> {
        self.engine.query(sql)
    }

    fn format(&self) -> Result<Option<FileFormat>> {
        self.config.format.as_deref().map(FileFormat::parse).transpose()
    }

    fn load_dataset(&mut self) -> Result<Arc<Dataset>> {
        let dataset = Arc::new(Dataset::open(
            Arc::clone(&self.fs),
            &self.config.path,
            self.format()?,
            self.config.partitioning.clone(),
        )?);
        self.engine
            .register(DATASET_SOURCE, RelationSource::Dataset(Arc::clone(&dataset)))?;
        debug!(path = %self.config.path, files = dataset.files().len(), "promoted to dataset tier");
        self.dataset = Some(Arc::clone(&dataset));
        self.tier = self.tier.max(Tier::Dataset);
        self.registered = true;
        Ok(dataset)
    }

    fn load_table(&mut self, options: &LoadOptions) -> Result<Arc<Table>> {
        let cache_name = options.cache_name.as_deref().unwrap_or(&self.config.cache_name);
        let table = if self.engine.table_names()?.contains(cache_name) {
            debug!(cache = cache_name, "materializing from engine temp table");
            let relation = self.engine.query(&format!("SELECT * FROM {cache_name}"))?;
            self.engine.relation_to_table(&relation)?
        } else {
            self.read_storage()?
        };
        let table = match &options.columns {
            Some(columns) => table.project(columns)?,
            None => table,
        };

        let table = Arc::new(table);
        self.engine
            .register(TABLE_SOURCE, RelationSource::Table(Arc::clone(&table)))?;
        debug!(path = %self.config.path, rows = table.num_rows(), "promoted to table tier");
        self.table = Some(Arc::clone(&table));
        self.tier = Tier::Table;
        self.registered = true;
        Ok(table)
    }

    fn read_storage(&mut self) -> Result<Table> {
        let path = self.config.path.clone();
        if !self.fs.exists(&path)? {
            return Err(LakeError::SourceNotFound {
                op: "read table",
                path,
            });
        }
        let format = self.format()?;
        if self.fs.is_file(&path)? {
            let format = format
                .or_else(|| FileFormat::from_path(&path))
                .ok_or_else(|| LakeError::UnsupportedFormat {
                    op: "read table",
                    format: path.clone(),
                })?;
            return read_table(format, self.fs.read(&path)?, &path);
        }
        self.dataset()?.to_table()
    }
}
