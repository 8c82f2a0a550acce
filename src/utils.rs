//! Column access helpers shared by the query and transform layers

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, RecordBatch, UInt32Array};
use arrow::compute::{cast, lexsort_to_indices, take, SortColumn, SortOptions};
use arrow::datatypes::{DataType, Schema};

use crate::error::{Result, StatsError};

/// Position of `name` in the batch schema, or a precondition error
pub fn column_index(batch: &RecordBatch, name: &str) -> Result<usize> {
    batch
        .schema()
        .fields()
        .iter()
        .position(|f| f.name() == name)
        .ok_or_else(|| StatsError::precondition(format!("column {name} not found")))
}

pub fn get_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    Ok(batch.column(column_index(batch, name)?))
}

pub fn is_numeric(data_type: &DataType) -> bool {
    data_type.is_integer() || data_type.is_floating()
}

/// Fetch a numeric column by name and widen it to Float64 with the Arrow cast kernel
pub fn get_f64_column(batch: &RecordBatch, name: &str) -> Result<Float64Array> {
    let col = get_column(batch, name)?;

    if !is_numeric(col.data_type()) {
        return Err(StatsError::precondition(format!(
            "column {name} is {} and not numeric",
            col.data_type()
        )));
    }

    let cast_array = cast(col, &DataType::Float64)?;
    cast_array
        .as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| StatsError::precondition(format!("column {name} did not cast to Float64")))
}

/// Sort direction for one key of [`sort_batch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self { column: column.into(), descending: false }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self { column: column.into(), descending: true }
    }
}

/// Stable multi-key sort. Nulls go last in either direction; rows that
/// compare equal on every key keep their input order.
pub fn sort_batch(batch: &RecordBatch, keys: &[OrderBy]) -> Result<RecordBatch> {
    if keys.is_empty() || batch.num_rows() < 2 {
        return Ok(batch.clone());
    }

    let mut columns = Vec::with_capacity(keys.len() + 1);
    for key in keys {
        columns.push(SortColumn {
            values: get_column(batch, &key.column)?.clone(),
            options: Some(SortOptions { descending: key.descending, nulls_first: false }),
        });
    }

    // Ordinal tie-breaker keeps the sort stable
    let ordinal: ArrayRef = Arc::new(UInt32Array::from_iter_values(0..batch.num_rows() as u32));
    columns.push(SortColumn { values: ordinal, options: None });

    let indices = lexsort_to_indices(&columns, None)?;
    take_rows(batch, &indices)
}

/// Gather rows by index from every column
pub fn take_rows(batch: &RecordBatch, indices: &UInt32Array) -> Result<RecordBatch> {
    let columns = batch
        .columns()
        .iter()
        .map(|col| take(col.as_ref(), indices, None))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(RecordBatch::try_new(batch.schema(), columns)?)
}

/// Keep only the named columns, in the given order
pub fn project(batch: &RecordBatch, names: &[&str]) -> Result<RecordBatch> {
    let indices = names
        .iter()
        .map(|name| column_index(batch, name))
        .collect::<Result<Vec<_>>>()?;
    Ok(batch.project(&indices)?)
}

/// Append one column to the right of the batch
pub fn append_column(batch: &RecordBatch, name: &str, values: ArrayRef) -> Result<RecordBatch> {
    if batch.schema().field_with_name(name).is_ok() {
        return Err(StatsError::precondition(format!("column {name} already exists")));
    }

    let mut fields: Vec<_> = batch.schema().fields().iter().map(|f| f.as_ref().clone()).collect();
    fields.push(arrow::datatypes::Field::new(name, values.data_type().clone(), true));

    let mut columns = batch.columns().to_vec();
    columns.push(values);

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};

    fn sample() -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            ("name", Arc::new(StringArray::from(vec!["a", "b", "c", "d"])) as ArrayRef),
            ("score", Arc::new(Int64Array::from(vec![Some(2), None, Some(5), Some(2)])) as ArrayRef),
        ])
        .unwrap()
    }

    #[test]
    fn test_sort_is_stable_with_nulls_last() {
        let sorted = sort_batch(&sample(), &[OrderBy::desc("score")]).unwrap();
        let names = sorted.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        let names: Vec<_> = names.iter().map(|v| v.unwrap()).collect();
        assert_eq!(names, vec!["c", "a", "d", "b"]);
    }

    #[test]
    fn test_get_f64_column_casts_integers() {
        let col = get_f64_column(&sample(), "score").unwrap();
        assert_eq!(col.value(2), 5.0);
        assert!(col.is_null(1));
    }

    #[test]
    fn test_missing_column_is_precondition() {
        let err = get_f64_column(&sample(), "nope").unwrap_err();
        assert!(matches!(err, StatsError::TransformPrecondition(_)));
        let err = get_f64_column(&sample(), "name").unwrap_err();
        assert!(matches!(err, StatsError::TransformPrecondition(_)));
    }

    #[test]
    fn test_append_column_rejects_duplicates() {
        let values: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3, 4]));
        let batch = append_column(&sample(), "extra", values.clone()).unwrap();
        assert_eq!(batch.num_columns(), 3);
        assert!(append_column(&batch, "extra", values).is_err());
    }
}
