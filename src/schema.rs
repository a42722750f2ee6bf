//! Schema unification.
//!
//! Reconciles divergent per-file schemas into one superset schema. Columns are
//! matched by name; where two inputs disagree on a column's type, the wider type
//! according to a [`TypeRankTable`] wins.
//!
//! Two schema representations share the algorithm through [`UnifySchema`]:
//! - arrow [`Schema`], ranked by [`TypeRankTable::arrow`]
//! - [`TypeMap`], a plain ordered name → [`ColumnType`] mapping, ranked by
//!   [`TypeRankTable::column_types`]
//!
//! Ranks are table positions, so the narrowest ranked type and every unranked
//! type share rank 0. A tie keeps the second schema's type.
//!
//! ```
//! use arrow::datatypes::{DataType, Field, Schema};
//! use lakeshard::schema::unify;
//!
//! let a = Schema::new(vec![Field::new("v", DataType::Int32, false)]);
//! let b = Schema::new(vec![Field::new("v", DataType::Float64, false)]);
//! let (merged, equal) = unify(&a, &b)?;
//! assert_eq!(merged.field(0).data_type(), &DataType::Float64);
//! assert!(!equal);
//! # Ok::<(), lakeshard::LakeError>(())
//! ```

use crate::error::{LakeError, Result};
use arrow::datatypes::{DataType, Field, Schema};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered list of promotable types, narrowest first.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeRankTable<T> {
    ranks: Vec<T>,
}

impl<T: PartialEq> TypeRankTable<T> {
    pub fn new(ranks: Vec<T>) -> Self {
        Self { ranks }
    }

    /// Position of `ty` in the table, or 0 when it is not ranked.
    pub fn rank(&self, ty: &T) -> usize {
        self.ranks.iter().position(|r| r == ty).unwrap_or(0)
    }

    /// The type a column typed `first` in one schema and `second` in the other
    /// is widened to. Only a strictly higher rank lets `first` win.
    pub fn wider<'a>(&self, first: &'a T, second: &'a T) -> &'a T {
        if self.rank(first) > self.rank(second) {
            first
        } else {
            second
        }
    }
}

impl TypeRankTable<DataType> {
    /// Ranking used for arrow schemas.
    #[must_use]
    pub fn arrow() -> Self {
        Self::new(vec![
            DataType::Int8,
            DataType::Int16,
            DataType::Int32,
            DataType::Int64,
            DataType::Float16,
            DataType::Float32,
            DataType::Float64,
            DataType::Utf8,
        ])
    }
}

impl TypeRankTable<ColumnType> {
    /// Ranking used for [`TypeMap`]. It has no half-precision float.
    #[must_use]
    pub fn column_types() -> Self {
        Self::new(vec![
            ColumnType::Int8,
            ColumnType::Int16,
            ColumnType::Int32,
            ColumnType::Int64,
            ColumnType::Float32,
            ColumnType::Float64,
            ColumnType::Utf8,
        ])
    }
}

/// Scalar column types of the plain mapping representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Utf8,
    Binary,
    Date,
    Datetime,
    Null,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Ordered column name → [`ColumnType`] mapping.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeMap {
    columns: Vec<(String, ColumnType)>,
}

impl TypeMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a column, keeping first-insertion order.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        let name = name.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = ty,
            None => self.columns.push((name, ty)),
        }
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<ColumnType> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, t)| *t)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.columns.iter().map(|(n, t)| (n.as_str(), *t))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, ColumnType)> for TypeMap {
    fn from_iter<I: IntoIterator<Item = (S, ColumnType)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |map, (name, ty)| map.with(name, ty))
    }
}

/// A schema representation the unifier can fold over.
pub trait UnifySchema: Sized {
    type Type: PartialEq + Clone;

    fn rank_table() -> TypeRankTable<Self::Type>;

    fn column_names(&self) -> Vec<&str>;

    fn column_type(&self, name: &str) -> Option<&Self::Type>;

    /// Build the unified schema from `self`, `other` and the chosen column types,
    /// given in `self`'s column order.
    fn rebuild(&self, other: &Self, columns: Vec<(String, Self::Type)>) -> Self;
}

impl UnifySchema for Schema {
    type Type = DataType;

    fn rank_table() -> TypeRankTable<DataType> {
        TypeRankTable::arrow()
    }

    fn column_names(&self) -> Vec<&str> {
        self.fields().iter().map(|f| f.name().as_str()).collect()
    }

    fn column_type(&self, name: &str) -> Option<&DataType> {
        self.field_with_name(name).ok().map(Field::data_type)
    }

    fn rebuild(&self, other: &Self, columns: Vec<(String, DataType)>) -> Self {
        let nullable =
            |s: &Schema, name: &str| s.field_with_name(name).is_ok_and(|f| f.is_nullable());
        let fields: Vec<Field> = columns
            .into_iter()
            .map(|(name, ty)| {
                let is_nullable = nullable(self, &name) || nullable(other, &name);
                Field::new(name, ty, is_nullable)
            })
            .collect();
        Schema::new_with_metadata(fields, self.metadata().clone())
    }
}

impl UnifySchema for TypeMap {
    type Type = ColumnType;

    fn rank_table() -> TypeRankTable<ColumnType> {
        TypeRankTable::column_types()
    }

    fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    fn column_type(&self, name: &str) -> Option<&ColumnType> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    fn rebuild(&self, _other: &Self, columns: Vec<(String, ColumnType)>) -> Self {
        Self { columns }
    }
}

/// Merge two schemas with the representation's own rank table.
///
/// Returns the unified schema and whether both inputs were already identical.
///
/// # Errors
/// [`LakeError::SchemaMismatch`] if a column is present in only one input.
pub fn unify<S: UnifySchema>(first: &S, second: &S) -> Result<(S, bool)> {
    unify_with(&S::rank_table(), first, second)
}

/// [`unify`] with an explicit rank table.
///
/// # Errors
/// [`LakeError::SchemaMismatch`] if a column is present in only one input.
pub fn unify_with<S: UnifySchema>(
    ranks: &TypeRankTable<S::Type>,
    first: &S,
    second: &S,
) -> Result<(S, bool)> {
    let names = first.column_names();
    if let Some(extra) = second.column_names().into_iter().find(|n| !names.contains(n)) {
        return Err(LakeError::SchemaMismatch {
            op: "unify",
            column: extra.to_string(),
        });
    }

    let mut equal = true;
    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let (Some(t1), Some(t2)) = (first.column_type(name), second.column_type(name)) else {
            return Err(LakeError::SchemaMismatch {
                op: "unify",
                column: name.to_string(),
            });
        };
        let ty = if t1 == t2 {
            t1.clone()
        } else {
            equal = false;
            ranks.wider(t1, t2).clone()
        };
        columns.push((name.to_string(), ty));
    }

    Ok((first.rebuild(second, columns), equal))
}

/// Fold [`unify`] left to right over `schemas`.
///
/// The equality flag is the AND of every pairwise result. An empty input
/// yields `None`.
///
/// # Errors
/// [`LakeError::SchemaMismatch`] from the first pair whose column names differ.
pub fn unify_many<S: UnifySchema + Clone>(schemas: &[S]) -> Result<Option<(S, bool)>> {
    let Some((head, rest)) = schemas.split_first() else {
        return Ok(None);
    };
    let ranks = S::rank_table();
    let mut merged = head.clone();
    let mut all_equal = true;
    for next in rest {
        let (schema, equal) = unify_with(&ranks, &merged, next)?;
        merged = schema;
        all_equal &= equal;
    }
    Ok(Some((merged, all_equal)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_of_unranked_is_zero() {
        let ranks = TypeRankTable::arrow();
        assert_eq!(ranks.rank(&DataType::Boolean), 0);
        assert_eq!(ranks.rank(&DataType::Int8), 0);
        assert_eq!(ranks.rank(&DataType::Utf8), 7);
    }

    #[test]
    fn wider_prefers_second_on_tie() {
        let ranks = TypeRankTable::column_types();
        assert_eq!(
            *ranks.wider(&ColumnType::Boolean, &ColumnType::Date),
            ColumnType::Date
        );
        assert_eq!(
            *ranks.wider(&ColumnType::Int64, &ColumnType::Int32),
            ColumnType::Int64
        );
    }
}
