//! Materialized in-memory columnar data.
//!
//! A [`Table`] is a schema plus zero or more arrow [`RecordBatch`]es sharing it.
//! The relational operations the query engine needs (projection, equality
//! filtering, distinct rows, row slicing) are implemented here with arrow
//! compute kernels.

use crate::error::{LakeError, Result};
use arrow::array::{Array, ArrayRef, BooleanArray, StringArray};
use arrow::compute::kernels::boolean::and;
use arrow::compute::kernels::cmp::eq;
use arrow::compute::{cast, concat_batches, filter_record_batch, is_null};
use arrow::datatypes::{DataType, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// One row rendered as literal values; `None` is SQL NULL.
pub type LiteralRow = Vec<Option<String>>;

/// Equality predicate `column = 'value'`, or `column IS NULL` when `value` is `None`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Predicate {
    pub column: String,
    pub value: Option<String>,
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: Some(value.into()),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: None,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{} = '{}'", self.column, v.replace('\'', "''")),
            None => write!(f, "{} IS NULL", self.column),
        }
    }
}

/// Render a conjunction the way it would appear in a `WHERE` clause.
#[must_use]
pub fn render_conjunction(predicates: &[Predicate]) -> String {
    predicates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[derive(Clone, Debug)]
pub struct Table {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl Table {
    /// Build a table from batches that all share `schema`.
    ///
    /// # Errors
    /// Returns [`LakeError::InvalidArgument`] if a batch's schema differs.
    pub fn try_new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<Self> {
        if let Some(bad) = batches.iter().find(|b| b.schema().fields() != schema.fields()) {
            return Err(LakeError::invalid(
                "table",
                format!("batch schema {:?} does not match table schema {schema:?}", bad.schema()),
            ));
        }
        Ok(Self { schema, batches })
    }

    #[must_use]
    pub fn empty(schema: SchemaRef) -> Self {
        Self {
            schema,
            batches: Vec::new(),
        }
    }

    #[must_use]
    pub fn from_batch(batch: RecordBatch) -> Self {
        Self {
            schema: batch.schema(),
            batches: vec![batch],
        }
    }

    /// Build a table from a non-empty list of batches, taking the first batch's schema.
    ///
    /// # Errors
    /// Returns [`LakeError::InvalidArgument`] if `batches` is empty or schemas differ.
    pub fn from_batches(batches: Vec<RecordBatch>) -> Result<Self> {
        let schema = batches
            .first()
            .map(RecordBatch::schema)
            .ok_or_else(|| LakeError::invalid("table", "no batches to infer a schema from"))?;
        Self::try_new(schema, batches)
    }

    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    /// All rows as a single batch.
    ///
    /// # Errors
    /// Propagates arrow concatenation errors.
    pub fn to_batch(&self) -> Result<RecordBatch> {
        concat_batches(&self.schema, &self.batches)
            .map_err(|e| LakeError::query("concat", e.to_string()))
    }

    /// Rows `[offset, offset + len)`, clamped to the table bounds. Zero-copy.
    #[must_use]
    pub fn slice(&self, offset: usize, len: usize) -> Self {
        let mut out = Vec::new();
        let mut skip = offset;
        let mut take = len;
        for batch in &self.batches {
            if take == 0 {
                break;
            }
            let n = batch.num_rows();
            if skip >= n {
                skip -= n;
                continue;
            }
            let here = (n - skip).min(take);
            out.push(batch.slice(skip, here));
            take -= here;
            skip = 0;
        }
        Self {
            schema: Arc::clone(&self.schema),
            batches: out,
        }
    }

    /// Keep only `columns`, in the given order.
    ///
    /// # Errors
    /// [`LakeError::Query`] if a column does not exist.
    pub fn project(&self, columns: &[String]) -> Result<Self> {
        let indices = columns
            .iter()
            .map(|c| {
                self.schema
                    .index_of(c)
                    .map_err(|_| LakeError::query("project", format!("column `{c}` not found")))
            })
            .collect::<Result<Vec<_>>>()?;
        let schema = Arc::new(
            self.schema
                .project(&indices)
                .map_err(|e| LakeError::query("project", e.to_string()))?,
        );
        let batches = self
            .batches
            .iter()
            .map(|b| b.project(&indices))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| LakeError::query("project", e.to_string()))?;
        Ok(Self { schema, batches })
    }

    /// Keep rows matching every predicate. Values compare against the column
    /// cast to UTF-8, so `id = '3'` matches an integer 3.
    ///
    /// # Errors
    /// [`LakeError::Query`] on unknown columns or uncastable column types.
    pub fn filter(&self, predicates: &[Predicate]) -> Result<Self> {
        let batches = self
            .batches
            .iter()
            .map(|batch| {
                let Some(mask) = predicate_mask(batch, predicates)? else {
                    return Ok(batch.clone());
                };
                filter_record_batch(batch, &mask)
                    .map_err(|e| LakeError::query("filter", e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            schema: Arc::clone(&self.schema),
            batches,
        })
    }

    /// Every row rendered as literals.
    ///
    /// # Errors
    /// [`LakeError::Query`] if a column type has no display form.
    pub fn literal_rows(&self) -> Result<Vec<LiteralRow>> {
        let options = FormatOptions::default();
        let mut rows = Vec::with_capacity(self.num_rows());
        for batch in &self.batches {
            let formatters = batch
                .columns()
                .iter()
                .map(|c| ArrayFormatter::try_new(c.as_ref(), &options))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| LakeError::query("fetch", e.to_string()))?;
            for i in 0..batch.num_rows() {
                let row = batch
                    .columns()
                    .iter()
                    .zip(&formatters)
                    .map(|(col, fmt)| (!col.is_null(i)).then(|| fmt.value(i).to_string()))
                    .collect();
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// First occurrence of every distinct row, in encounter order.
    ///
    /// # Errors
    /// [`LakeError::Query`] if a column type has no display form.
    pub fn distinct(&self) -> Result<Self> {
        let rows = self.literal_rows()?;
        let mut seen = HashSet::with_capacity(rows.len());
        let keep: BooleanArray = rows.into_iter().map(|r| Some(seen.insert(r))).collect();
        let batch = self.to_batch()?;
        let batch = filter_record_batch(&batch, &keep)
            .map_err(|e| LakeError::query("distinct", e.to_string()))?;
        Ok(Self::from_batch(batch))
    }

    /// Cast every column to the matching field of `target`, which must list
    /// the same column names. Columns are reordered to `target`'s order.
    ///
    /// # Errors
    /// [`LakeError::SchemaMismatch`] for missing columns, [`LakeError::Query`]
    /// for failed casts.
    pub fn cast_to(&self, target: &SchemaRef) -> Result<Self> {
        if self.schema.fields() == target.fields() {
            return Ok(self.clone());
        }
        let mut batches = Vec::with_capacity(self.batches.len());
        for batch in &self.batches {
            let columns = target
                .fields()
                .iter()
                .map(|field| {
                    let column = batch.column_by_name(field.name()).ok_or_else(|| {
                        LakeError::SchemaMismatch {
                            op: "cast",
                            column: field.name().clone(),
                        }
                    })?;
                    cast(column, field.data_type()).map_err(|e| {
                        LakeError::query("cast", format!("column `{}`: {e}", field.name()))
                    })
                })
                .collect::<Result<Vec<ArrayRef>>>()?;
            batches.push(
                RecordBatch::try_new(Arc::clone(target), columns)
                    .map_err(|e| LakeError::query("cast", e.to_string()))?,
            );
        }
        Ok(Self {
            schema: Arc::clone(target),
            batches,
        })
    }

    /// Append a constant UTF-8 column (null when `value` is `None`).
    ///
    /// # Errors
    /// Propagates arrow batch construction errors.
    pub fn with_constant_column(&self, name: &str, value: Option<&str>) -> Result<Self> {
        let mut fields = self.schema.fields().to_vec();
        fields.push(Arc::new(arrow::datatypes::Field::new(name, DataType::Utf8, true)));
        let schema = Arc::new(Schema::new_with_metadata(fields, self.schema.metadata().clone()));
        let batches = self
            .batches
            .iter()
            .map(|b| {
                let mut columns = b.columns().to_vec();
                let constant: StringArray = std::iter::repeat_n(value, b.num_rows()).collect();
                columns.push(Arc::new(constant) as ArrayRef);
                RecordBatch::try_new(Arc::clone(&schema), columns)
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| LakeError::query("partition column", e.to_string()))?;
        Ok(Self { schema, batches })
    }

    /// Concatenate tables that share one schema.
    ///
    /// # Errors
    /// [`LakeError::InvalidArgument`] if schemas differ.
    pub fn concat(schema: SchemaRef, tables: Vec<Table>) -> Result<Self> {
        let batches = tables.into_iter().flat_map(|t| t.batches).collect();
        Self::try_new(schema, batches)
    }
}

fn predicate_mask(batch: &RecordBatch, predicates: &[Predicate]) -> Result<Option<BooleanArray>> {
    let mut mask: Option<BooleanArray> = None;
    for predicate in predicates {
        let column = batch.column_by_name(&predicate.column).ok_or_else(|| {
            LakeError::query("filter", format!("column `{}` not found", predicate.column))
        })?;
        let matches = match &predicate.value {
            None => is_null(column.as_ref()),
            Some(value) => cast(column, &DataType::Utf8)
                .and_then(|text| eq(&text, &StringArray::new_scalar(value.as_str()))),
        }
        .map_err(|e| LakeError::query("filter", format!("{predicate}: {e}")))?;
        mask = Some(match mask {
            None => matches,
            Some(prev) => {
                and(&prev, &matches).map_err(|e| LakeError::query("filter", e.to_string()))?
            }
        });
    }
    Ok(mask)
}
