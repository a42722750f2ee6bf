//! Query-engine seam.
//!
//! lakeshard needs only a narrow slice of an analytical engine: a catalog of
//! named sources and temp tables, `SELECT * FROM <name>` lookups, and lazy
//! relations supporting projection, distinct, equality filters and limits.
//! [`QueryEngine`] is that slice; [`MemoryEngine`] implements it over
//! in-memory arrow tables.

use crate::dataset::{Dataset, Partitioning};
use crate::error::{LakeError, Result};
use crate::format::FileFormat;
use crate::io::fs::{FileSystem, LocalFileSystem};
use crate::table::{LiteralRow, Predicate, Table, render_conjunction};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// What a relation reads from.
#[derive(Clone, Debug)]
pub enum RelationSource {
    /// Already materialized; shared, not copied.
    Table(Arc<Table>),
    /// Re-read from storage every time the relation is evaluated.
    Dataset(Arc<Dataset>),
}

impl RelationSource {
    fn load(&self) -> Result<Table> {
        match self {
            Self::Table(t) => Ok(t.as_ref().clone()),
            Self::Dataset(d) => d.to_table(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum RelationOp {
    Project(Vec<String>),
    Distinct,
    Filter(Vec<Predicate>),
    Limit { limit: usize, offset: usize },
}

/// Deferred query: a source plus the operations to apply when evaluated.
#[derive(Clone, Debug)]
pub struct Relation {
    source: RelationSource,
    ops: Vec<RelationOp>,
}

impl Relation {
    #[must_use]
    pub fn from_table(table: Arc<Table>) -> Self {
        Self {
            source: RelationSource::Table(table),
            ops: Vec::new(),
        }
    }

    #[must_use]
    pub fn from_dataset(dataset: Arc<Dataset>) -> Self {
        Self {
            source: RelationSource::Dataset(dataset),
            ops: Vec::new(),
        }
    }

    #[must_use]
    pub fn source(&self) -> &RelationSource {
        &self.source
    }

    #[must_use]
    pub fn project(mut self, columns: Vec<String>) -> Self {
        self.ops.push(RelationOp::Project(columns));
        self
    }

    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.ops.push(RelationOp::Distinct);
        self
    }

    /// Keep rows matching every predicate.
    #[must_use]
    pub fn filter(mut self, predicates: Vec<Predicate>) -> Self {
        self.ops.push(RelationOp::Filter(predicates));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize, offset: usize) -> Self {
        self.ops.push(RelationOp::Limit { limit, offset });
        self
    }

    /// Evaluate the relation.
    ///
    /// # Errors
    /// Storage/codec errors from the source, [`LakeError::Query`] from the operations.
    pub fn to_table(&self) -> Result<Table> {
        let mut table = self.source.load()?;
        for op in &self.ops {
            table = match op {
                RelationOp::Project(columns) => table.project(columns)?,
                RelationOp::Distinct => table.distinct()?,
                RelationOp::Filter(predicates) => table.filter(predicates)?,
                RelationOp::Limit { limit, offset } => table.slice(*offset, *limit),
            };
        }
        Ok(table)
    }

    /// Evaluate and return every row as literals.
    ///
    /// # Errors
    /// See [`Relation::to_table`].
    pub fn fetch_all(&self) -> Result<Vec<LiteralRow>> {
        self.to_table()?.literal_rows()
    }

    /// # Errors
    /// See [`Relation::to_table`].
    pub fn num_rows(&self) -> Result<usize> {
        Ok(self.to_table()?.num_rows())
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            RelationSource::Table(t) => write!(f, "table[{} rows]", t.num_rows())?,
            RelationSource::Dataset(d) => write!(f, "dataset[{}]", d.root())?,
        }
        for op in &self.ops {
            match op {
                RelationOp::Project(c) => write!(f, " -> project({})", c.join(", "))?,
                RelationOp::Distinct => write!(f, " -> distinct")?,
                RelationOp::Filter(p) => write!(f, " -> where {}", render_conjunction(p))?,
                RelationOp::Limit { limit, offset } => {
                    write!(f, " -> limit {limit} offset {offset}")?;
                }
            }
        }
        Ok(())
    }
}

/// The engine operations lakeshard relies on.
pub trait QueryEngine: Send + Sync + fmt::Debug {
    /// Register `source` under `name` without materializing it.
    ///
    /// # Errors
    /// Engine-specific registration failures.
    fn register(&self, name: &str, source: RelationSource) -> Result<()>;

    /// Evaluate `relation` and store the result as temp table `name`.
    ///
    /// # Errors
    /// Errors from evaluating the relation.
    fn create_or_replace_temp_table(&self, name: &str, relation: &Relation) -> Result<()>;

    /// Run a `SELECT * FROM <name>` or `SELECT * FROM '<path>'` query.
    ///
    /// # Errors
    /// [`LakeError::Query`] for unsupported SQL or unknown names.
    fn query(&self, sql: &str) -> Result<Relation>;

    /// Names of every registered source and temp table.
    ///
    /// # Errors
    /// Engine-specific catalog failures.
    fn table_names(&self) -> Result<BTreeSet<String>>;

    /// # Errors
    /// See [`Relation::to_table`].
    fn relation_to_table(&self, relation: &Relation) -> Result<Table> {
        relation.to_table()
    }

    /// # Errors
    /// [`LakeError::Query`] if nothing is registered under `name`.
    fn drop_table(&self, name: &str) -> Result<()>;
}

#[derive(Clone, Debug)]
struct CatalogEntry {
    source: RelationSource,
    temporary: bool,
}

/// In-process engine over arrow tables.
///
/// Quoted `FROM` targets that are not registered names are opened as datasets
/// through the engine's filesystem.
#[derive(Clone, Debug)]
pub struct MemoryEngine {
    fs: Arc<dyn FileSystem>,
    catalog: Arc<Mutex<HashMap<String, CatalogEntry>>>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new(Arc::new(LocalFileSystem::new()))
    }
}

impl MemoryEngine {
    #[must_use]
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            catalog: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether `name` is a temp table (as opposed to a registered source).
    #[must_use]
    pub fn is_temporary(&self, name: &str) -> bool {
        self.catalog.lock().get(name).is_some_and(|e| e.temporary)
    }

    fn open_path(&self, path: &str) -> Result<Relation> {
        let dataset = Dataset::open(
            Arc::clone(&self.fs),
            path,
            FileFormat::from_path(path),
            Partitioning::Hive,
        )?;
        Ok(Relation::from_dataset(Arc::new(dataset)))
    }
}

/// Target of a `SELECT * FROM <target>` statement.
#[derive(Debug, PartialEq, Eq)]
enum FromTarget<'a> {
    Name(&'a str),
    Quoted(&'a str),
}

fn parse_select_all(sql: &str) -> Option<FromTarget<'_>> {
    let sql = sql.trim().trim_end_matches(';').trim();
    let mut parts = sql.splitn(4, char::is_whitespace).filter(|s| !s.is_empty());
    let (select, star, from) = (parts.next()?, parts.next()?, parts.next()?);
    if !select.eq_ignore_ascii_case("SELECT") || star != "*" || !from.eq_ignore_ascii_case("FROM") {
        return None;
    }
    let target = parts.next()?.trim();
    if let Some(quoted) = target.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return Some(FromTarget::Quoted(quoted));
    }
    if let Some(quoted) = target.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        return Some(FromTarget::Name(quoted));
    }
    (!target.contains(char::is_whitespace)).then_some(FromTarget::Name(target))
}

impl QueryEngine for MemoryEngine {
    fn register(&self, name: &str, source: RelationSource) -> Result<()> {
        debug!(name, "registering source");
        self.catalog.lock().insert(
            name.to_string(),
            CatalogEntry {
                source,
                temporary: false,
            },
        );
        Ok(())
    }

    fn create_or_replace_temp_table(&self, name: &str, relation: &Relation) -> Result<()> {
        let table = relation.to_table()?;
        debug!(name, rows = table.num_rows(), "created temp table");
        self.catalog.lock().insert(
            name.to_string(),
            CatalogEntry {
                source: RelationSource::Table(Arc::new(table)),
                temporary: true,
            },
        );
        Ok(())
    }

    fn query(&self, sql: &str) -> Result<Relation> {
        let target = parse_select_all(sql)
            .ok_or_else(|| LakeError::query("query", format!("unsupported statement: {sql}")))?;
        let name = match target {
            FromTarget::Name(n) | FromTarget::Quoted(n) => n,
        };
        if let Some(entry) = self.catalog.lock().get(name) {
            return Ok(Relation {
                source: entry.source.clone(),
                ops: Vec::new(),
            });
        }
        match target {
            FromTarget::Quoted(path) => self.open_path(path),
            FromTarget::Name(n) => Err(LakeError::query(
                "query",
                format!("table `{n}` does not exist"),
            )),
        }
    }

    fn table_names(&self) -> Result<BTreeSet<String>> {
        Ok(self.catalog.lock().keys().cloned().collect())
    }

    fn drop_table(&self, name: &str) -> Result<()> {
        match self.catalog.lock().remove(name) {
            Some(_) => Ok(()),
            None => Err(LakeError::query("drop table", format!("table `{name}` does not exist"))),
        }
    }
}
