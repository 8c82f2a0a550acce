//! Hash group-by aggregation
//!
//! Group keys are encoded with the Arrow row format so any mix of key
//! column types hashes as a single byte string. Groups are emitted in the
//! order their first row was seen; callers sort afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, RecordBatch};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::row::{OwnedRow, RowConverter, SortField};

use crate::error::{Result, StatsError};
use crate::utils::{get_column, get_f64_column, is_numeric};

/// Aggregate function applied to one source column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    /// Non-null values in the group
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggFunc::Count => "count",
            AggFunc::Sum => "sum",
            AggFunc::Avg => "avg",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
        };
        f.write_str(name)
    }
}

/// `func(column) AS alias`
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSpec {
    pub func: AggFunc,
    pub column: String,
    pub alias: String,
}

impl AggregateSpec {
    pub fn new(func: AggFunc, column: &str, alias: &str) -> Self {
        Self { func, column: column.to_string(), alias: alias.to_string() }
    }

    pub fn count(column: &str, alias: &str) -> Self {
        Self::new(AggFunc::Count, column, alias)
    }

    pub fn sum(column: &str, alias: &str) -> Self {
        Self::new(AggFunc::Sum, column, alias)
    }

    pub fn avg(column: &str, alias: &str) -> Self {
        Self::new(AggFunc::Avg, column, alias)
    }

    pub fn min(column: &str, alias: &str) -> Self {
        Self::new(AggFunc::Min, column, alias)
    }

    pub fn max(column: &str, alias: &str) -> Self {
        Self::new(AggFunc::Max, column, alias)
    }
}

/// Running state for one aggregate within one group
#[derive(Debug, Clone, Copy)]
pub struct AggState {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for AggState {
    fn default() -> Self {
        Self { count: 0, sum: 0.0, min: f64::INFINITY, max: f64::NEG_INFINITY }
    }
}

impl AggState {
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Merge another state into this one
    pub fn merge(&mut self, other: &AggState) {
        self.count += other.count;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Final value for `func`; `None` (null) for avg/min/max of an empty state
    pub fn finish(&self, func: AggFunc) -> Option<f64> {
        match func {
            AggFunc::Count => Some(self.count as f64),
            AggFunc::Sum => Some(self.sum),
            _ if self.is_empty() => None,
            AggFunc::Avg => Some(self.sum / self.count as f64),
            AggFunc::Min => Some(self.min),
            AggFunc::Max => Some(self.max),
        }
    }
}

/// Output type of an aggregate given its source column type
fn output_type(func: AggFunc, source: &DataType) -> DataType {
    match func {
        AggFunc::Count => DataType::Int64,
        AggFunc::Avg => DataType::Float64,
        AggFunc::Sum | AggFunc::Min | AggFunc::Max if source.is_integer() => DataType::Int64,
        _ => DataType::Float64,
    }
}

/// Group-by aggregator over one or more batches sharing a schema
pub struct Aggregator {
    group_by: Vec<String>,
    aggregates: Vec<AggregateSpec>,
    converter: RowConverter,
    key_fields: Vec<Field>,
    source_types: Vec<DataType>,
    groups: HashMap<OwnedRow, usize>,
    /// Group keys in first-seen order
    keys: Vec<OwnedRow>,
    /// states[group][aggregate]
    states: Vec<Vec<AggState>>,
}

impl Aggregator {
    /// Validate the group and aggregate columns against `schema`
    pub fn new(schema: &Schema, group_by: &[&str], aggregates: &[AggregateSpec]) -> Result<Self> {
        let key_fields = group_by
            .iter()
            .map(|name| {
                schema
                    .field_with_name(name)
                    .map(|f| Field::new(*name, f.data_type().clone(), true))
                    .map_err(|_| StatsError::precondition(format!("group column {name} not found")))
            })
            .collect::<Result<Vec<_>>>()?;

        let source_types = aggregates
            .iter()
            .map(|spec| {
                let field = schema.field_with_name(&spec.column).map_err(|_| {
                    StatsError::precondition(format!("aggregate column {} not found", spec.column))
                })?;
                if spec.func != AggFunc::Count && !is_numeric(field.data_type()) {
                    return Err(StatsError::precondition(format!(
                        "{}({}) needs a numeric column",
                        spec.func, spec.column
                    )));
                }
                Ok(field.data_type().clone())
            })
            .collect::<Result<Vec<_>>>()?;

        let sort_fields = key_fields.iter().map(|f| SortField::new(f.data_type().clone())).collect();
        let converter = RowConverter::new(sort_fields)?;

        Ok(Self {
            group_by: group_by.iter().map(|s| s.to_string()).collect(),
            aggregates: aggregates.to_vec(),
            converter,
            key_fields,
            source_types,
            groups: HashMap::new(),
            keys: Vec::new(),
            states: Vec::new(),
        })
    }

    /// Fold every row of `batch` into its group
    pub fn aggregate_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        let len = batch.num_rows();
        if len == 0 {
            return Ok(());
        }

        let key_columns = self
            .group_by
            .iter()
            .map(|name| get_column(batch, name).cloned())
            .collect::<Result<Vec<ArrayRef>>>()?;
        let rows = self.converter.convert_columns(&key_columns)?;

        // Count needs only validity; the rest read values as f64
        let values = self
            .aggregates
            .iter()
            .map(|spec| match spec.func {
                AggFunc::Count => Ok(None),
                _ => get_f64_column(batch, &spec.column).map(Some),
            })
            .collect::<Result<Vec<Option<Float64Array>>>>()?;
        let validity = self
            .aggregates
            .iter()
            .map(|spec| get_column(batch, &spec.column).cloned())
            .collect::<Result<Vec<ArrayRef>>>()?;

        for i in 0..len {
            let owned = rows.row(i).owned();
            let group = match self.groups.get(&owned) {
                Some(&g) => g,
                None => {
                    let g = self.keys.len();
                    self.groups.insert(owned.clone(), g);
                    self.keys.push(owned);
                    self.states.push(vec![AggState::default(); self.aggregates.len()]);
                    g
                }
            };

            for (a, state) in self.states[group].iter_mut().enumerate() {
                if validity[a].is_null(i) {
                    continue;
                }
                match &values[a] {
                    Some(vals) => state.update(vals.value(i)),
                    None => state.count += 1,
                }
            }
        }

        Ok(())
    }

    pub fn num_groups(&self) -> usize {
        self.keys.len()
    }

    /// Build the result table: key columns, then one column per aggregate alias
    pub fn finish(&self) -> Result<RecordBatch> {
        let mut columns = self.converter.convert_rows(self.keys.iter().map(|k| k.row()))?;
        let mut fields = self.key_fields.clone();

        for (a, spec) in self.aggregates.iter().enumerate() {
            let values: Float64Array = self.states.iter().map(|s| s[a].finish(spec.func)).collect();
            let out_type = output_type(spec.func, &self.source_types[a]);
            let array: ArrayRef = if out_type == DataType::Float64 {
                Arc::new(values)
            } else {
                // Counts and integer sums are exact in f64 well past any league table
                let ints: Int64Array = values.iter().map(|v| v.map(|x| x as i64)).collect();
                cast(&ints, &out_type)?
            };
            fields.push(Field::new(&spec.alias, out_type, true));
            columns.push(array);
        }

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
    }
}

/// One-shot group-by over a single batch
pub fn group_by(
    batch: &RecordBatch,
    keys: &[&str],
    aggregates: &[AggregateSpec],
) -> Result<RecordBatch> {
    let mut aggregator = Aggregator::new(batch.schema().as_ref(), keys, aggregates)?;
    aggregator.aggregate_batch(batch)?;
    aggregator.finish()
}
