//! Partition planning: the distinct key tuples a write fans out over.

use crate::engine::Relation;
use crate::error::{LakeError, Result};
use crate::table::{LiteralRow, Predicate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Directory segment value standing in for a null partition value.
pub const NULL_SEGMENT: &str = "__HIVE_DEFAULT_PARTITION__";

/// Literal values of the partition columns for one partition, in
/// partition-column order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    values: LiteralRow,
}

impl PartitionKey {
    #[must_use]
    pub fn new(values: LiteralRow) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    /// One equality predicate per column, pairing `columns[i]` with the i-th value.
    #[must_use]
    pub fn predicates(&self, columns: &[String]) -> Vec<Predicate> {
        columns
            .iter()
            .zip(&self.values)
            .map(|(column, value)| match value {
                Some(v) => Predicate::eq(column.clone(), v.clone()),
                None => Predicate::is_null(column.clone()),
            })
            .collect()
    }

    /// `column=value` directory segments, in column order.
    #[must_use]
    pub fn segments(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .zip(&self.values)
            .map(|(column, value)| {
                let value = value.as_deref().map_or(NULL_SEGMENT.into(), sanitize_segment);
                format!("{column}={value}")
            })
            .collect()
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<&str> = self
            .values
            .iter()
            .map(|v| v.as_deref().unwrap_or("NULL"))
            .collect();
        write!(f, "({})", rendered.join(", "))
    }
}

/// Partition column names. A single name is accepted wherever a list is, and
/// promoted to a one-element list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OneOrMany", into = "Vec<String>")]
pub struct PartitionColumns(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for PartitionColumns {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(name) => Self(vec![name]),
            OneOrMany::Many(names) => Self(names),
        }
    }
}

impl From<PartitionColumns> for Vec<String> {
    fn from(value: PartitionColumns) -> Self {
        value.0
    }
}

impl PartitionColumns {
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for PartitionColumns {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for PartitionColumns {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for PartitionColumns {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<&[&str]> for PartitionColumns {
    fn from(names: &[&str]) -> Self {
        Self(names.iter().map(|n| (*n).to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for PartitionColumns {
    fn from(names: [&str; N]) -> Self {
        Self(names.iter().map(|n| (*n).to_string()).collect())
    }
}

/// Path separators inside a value would create extra directory levels, and
/// colons are not allowed in Windows file names.
fn sanitize_segment(value: &str) -> String {
    value.replace(['/', '\\'], "_").replace(':', "-")
}

/// Distinct combinations of `columns` in `relation`, one [`PartitionKey`] per
/// combination, each exactly once.
///
/// # Errors
/// [`LakeError::InvalidArgument`] for an empty column list, [`LakeError::Query`]
/// if a column is missing.
pub fn plan_partitions(relation: &Relation, columns: &[String]) -> Result<Vec<PartitionKey>> {
    if columns.is_empty() {
        return Err(LakeError::invalid("plan partitions", "no partition columns given"));
    }
    let rows = relation
        .clone()
        .project(columns.to_vec())
        .distinct()
        .fetch_all()?;
    Ok(rows.into_iter().map(PartitionKey::new).collect())
}
