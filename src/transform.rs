//! Tabular transforms over result tables
//!
//! Each operation takes a batch and returns a new one. An empty input
//! always produces an empty output with the shape the operation implies.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use tracing::debug;

use crate::error::{Result, StatsError};
use crate::expressions::Expr;
use crate::utils::{append_column, get_column, get_f64_column, sort_batch, OrderBy};
use crate::value::{column_cells, CellValue};

/// Long to wide: one row per distinct `index` value, one Float64 column per
/// distinct `columns` value, cells summed from `values`. Both axes are sorted
/// ascending; combinations with no source rows get `fill`.
pub fn pivot(batch: &RecordBatch, index: &str, columns: &str, values: &str, fill: f64) -> Result<RecordBatch> {
    pivot_ordered(batch, index, columns, values, fill, None)
}

/// [`pivot`] with the value columns laid out in `column_order` (matched on
/// display text) instead of ascending. Listed values that never occur get no
/// column; values missing from the list follow, ascending.
pub fn pivot_ordered(
    batch: &RecordBatch,
    index: &str,
    columns: &str,
    values: &str,
    fill: f64,
    column_order: Option<&[String]>,
) -> Result<RecordBatch> {
    let index_col = get_column(batch, index)?;
    let index_type = index_col.data_type().clone();
    let index_cells = column_cells(index_col)?;
    let pivot_cells = column_cells(get_column(batch, columns)?)?;
    let value_col = get_f64_column(batch, values)?;

    let row_keys = distinct_sorted(&index_cells);
    let mut col_keys = distinct_sorted(&pivot_cells);
    if let Some(order) = column_order {
        // stable, so unlisted values keep their ascending order
        col_keys.sort_by_key(|key| {
            let text = key.to_string();
            order.iter().position(|o| *o == text).unwrap_or(order.len())
        });
    }

    let row_pos: HashMap<String, usize> = row_keys.iter().enumerate().map(|(i, k)| (key_of(k), i)).collect();
    let col_pos: HashMap<String, usize> = col_keys.iter().enumerate().map(|(i, k)| (key_of(k), i)).collect();

    // cells[column][row]
    let mut cells: Vec<Vec<Option<f64>>> = vec![vec![None; row_keys.len()]; col_keys.len()];
    for i in 0..batch.num_rows() {
        if value_col.is_null(i) {
            continue;
        }
        let r = row_pos[&key_of(&index_cells[i])];
        let c = col_pos[&key_of(&pivot_cells[i])];
        let slot = &mut cells[c][r];
        *slot = Some(slot.unwrap_or(0.0) + value_col.value(i));
    }

    let mut fields = vec![Field::new(index, index_type.clone(), true)];
    let mut arrays: Vec<ArrayRef> = vec![CellValue::build_array(&index_type, &row_keys)?];
    for (key, column) in col_keys.iter().zip(cells) {
        let name = key.to_string();
        if fields.iter().any(|f| f.name() == &name) {
            return Err(StatsError::precondition(format!("pivot column {name} collides with the index")));
        }
        fields.push(Field::new(name, DataType::Float64, false));
        let filled: Float64Array = column.into_iter().map(|v| Some(v.unwrap_or(fill))).collect();
        arrays.push(Arc::new(filled));
    }

    debug!(index, columns, values, out_columns = arrays.len(), "pivot");
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Wide to long: one row per (index, column) cell, with the column name in
/// `var_name` and the cell in `value_name`.
pub fn unpivot(batch: &RecordBatch, index: &str, var_name: &str, value_name: &str) -> Result<RecordBatch> {
    let index_col = get_column(batch, index)?;
    let index_type = index_col.data_type().clone();
    let index_cells = column_cells(index_col)?;

    let schema = batch.schema();
    let value_fields: Vec<&str> = schema
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .filter(|name| *name != index)
        .collect();
    let value_columns = value_fields
        .iter()
        .map(|name| get_f64_column(batch, name))
        .collect::<Result<Vec<_>>>()?;

    let mut out_index = Vec::new();
    let mut out_var = Vec::new();
    let mut out_value = Vec::new();
    for row in 0..batch.num_rows() {
        for (name, col) in value_fields.iter().zip(&value_columns) {
            out_index.push(index_cells[row].clone());
            out_var.push(*name);
            out_value.push((!col.is_null(row)).then(|| col.value(row)));
        }
    }

    let fields = vec![
        Field::new(index, index_type.clone(), true),
        Field::new(var_name, DataType::Utf8, false),
        Field::new(value_name, DataType::Float64, true),
    ];
    let arrays: Vec<ArrayRef> = vec![
        CellValue::build_array(&index_type, &out_index)?,
        Arc::new(StringArray::from(out_var)),
        Arc::new(Float64Array::from(out_value)),
    ];
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Equal-width bucket edges over the finite `[min, max]`: `buckets + 1`
/// ascending values. `None` when there are no finite values.
pub fn bin_edges(values: &Float64Array, buckets: usize) -> Option<Vec<f64>> {
    let (min, max) = values
        .iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;
    let width = (max - min) / buckets as f64;
    let mut edges: Vec<f64> = (0..buckets).map(|i| min + width * i as f64).collect();
    edges.push(max);
    Some(edges)
}

/// Bucket index of `value` given `bin_edges` output. Buckets are closed on
/// the right, `(lo, hi]`, and the first one also takes the minimum, so a
/// value on an interior edge belongs to the lower bucket. `None` for
/// non-finite values.
pub fn bucket_of(value: f64, edges: &[f64]) -> Option<usize> {
    if !value.is_finite() {
        return None;
    }
    let buckets = edges.len() - 1;
    let (min, max) = (edges[0], edges[buckets]);
    if max <= min {
        return Some(0);
    }
    let width = (max - min) / buckets as f64;
    let position = ((value - min) / width).ceil() - 1.0;
    Some(position.clamp(0.0, (buckets - 1) as f64) as usize)
}

/// Label each row of `column` with its equal-width bucket over the observed
/// range and append the labels as `output`. The maximum lands in the last
/// bucket; a constant column collapses to the first label; nulls and
/// non-finite values stay null.
pub fn bin(batch: &RecordBatch, column: &str, output: &str, labels: &[&str]) -> Result<RecordBatch> {
    if labels.is_empty() {
        return Err(StatsError::precondition("binning needs at least one label"));
    }
    let values = get_f64_column(batch, column)?;

    let assigned: StringArray = match bin_edges(&values, labels.len()) {
        Some(edges) => values
            .iter()
            .map(|v| v.and_then(|v| bucket_of(v, &edges)).map(|k| labels[k]))
            .collect(),
        None => values.iter().map(|_| None::<&str>).collect(),
    };

    append_column(batch, output, Arc::new(assigned))
}

/// Sort ascending by `order` (stable) and append `<column>_cumulative`
/// running totals for each of `columns`. Nulls add nothing.
pub fn cumulative_sum(batch: &RecordBatch, order: &str, columns: &[&str]) -> Result<RecordBatch> {
    let mut sorted = sort_batch(batch, &[OrderBy::asc(order)])?;

    for name in columns {
        let values = get_f64_column(&sorted, name)?;
        let running: Float64Array = values
            .iter()
            .scan(0.0, |acc, v| {
                *acc += v.unwrap_or(0.0);
                Some(Some(*acc))
            })
            .collect();
        sorted = append_column(&sorted, &format!("{name}_cumulative"), Arc::new(running))?;
    }

    Ok(sorted)
}

/// Stable sort on `rank` and keep the first `n` rows
pub fn top_n(batch: &RecordBatch, rank: &str, n: usize, ascending: bool) -> Result<RecordBatch> {
    let key = if ascending { OrderBy::asc(rank) } else { OrderBy::desc(rank) };
    let sorted = sort_batch(batch, &[key])?;
    Ok(sorted.slice(0, n.min(sorted.num_rows())))
}

/// First `n` rows in their current order
pub fn head(batch: &RecordBatch, n: usize) -> RecordBatch {
    batch.slice(0, n.min(batch.num_rows()))
}

/// Append `name` computed from `expr`
pub fn derived_column(batch: &RecordBatch, name: &str, expr: &Expr) -> Result<RecordBatch> {
    let values = expr.evaluate(batch)?;
    append_column(batch, name, Arc::new(values))
}

fn distinct_sorted(cells: &[CellValue]) -> Vec<CellValue> {
    let mut out: Vec<CellValue> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for cell in cells {
        if seen.insert(key_of(cell)) {
            out.push(cell.clone());
        }
    }
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Hashable identity of a cell, kind-tagged so 1 and "1" stay apart
fn key_of(cell: &CellValue) -> String {
    match cell {
        CellValue::Null => "n:".to_string(),
        CellValue::Bool(v) => format!("b:{v}"),
        CellValue::Int(v) => format!("i:{v}"),
        CellValue::Float(v) => format!("f:{}", v.to_bits()),
        CellValue::Text(v) => format!("t:{v}"),
        CellValue::Date(v) => format!("d:{v}"),
    }
}

/// One step of a transform pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Pivot {
        index: String,
        columns: String,
        values: String,
        fill: f64,
        /// Value column order for ordered categories; ascending when `None`
        column_order: Option<Vec<String>>,
    },
    Unpivot { index: String, var_name: String, value_name: String },
    Bin { column: String, output: String, labels: Vec<String> },
    CumulativeSum { order: String, columns: Vec<String> },
    TopN { rank: String, n: usize, ascending: bool },
    Head(usize),
    Derived { name: String, expr: Expr },
}

impl Transform {
    pub fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        match self {
            Transform::Pivot { index, columns, values, fill, column_order } => {
                pivot_ordered(batch, index, columns, values, *fill, column_order.as_deref())
            }
            Transform::Unpivot { index, var_name, value_name } => unpivot(batch, index, var_name, value_name),
            Transform::Bin { column, output, labels } => {
                let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
                bin(batch, column, output, &labels)
            }
            Transform::CumulativeSum { order, columns } => {
                let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
                cumulative_sum(batch, order, &columns)
            }
            Transform::TopN { rank, n, ascending } => top_n(batch, rank, *n, *ascending),
            Transform::Head(n) => Ok(head(batch, *n)),
            Transform::Derived { name, expr } => derived_column(batch, name, expr),
        }
    }
}

/// Transforms applied in order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    steps: Vec<Transform>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, step: Transform) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[Transform] {
        &self.steps
    }

    pub fn run(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let mut table = batch.clone();
        for step in &self.steps {
            table = step.apply(&table)?;
        }
        Ok(table)
    }
}
