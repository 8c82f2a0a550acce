//! Scalar cell values extracted from result tables

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Date32Array, Float64Array, Int64Array, RecordBatch,
    StringArray,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use chrono::NaiveDate;
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::{Result, StatsError};

/// Days between 0001-01-01 (CE day 1) and the Unix epoch
const UNIX_EPOCH_FROM_CE: i32 = 719_163;

pub fn date_to_days(date: NaiveDate) -> i32 {
    use chrono::Datelike;
    date.num_days_from_ce() - UNIX_EPOCH_FROM_CE
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_FROM_CE)
}

/// One cell of a result table
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl CellValue {
    /// Read row `row` of `array`, widening integer types to i64 and floats to f64
    pub fn from_array(array: &ArrayRef, row: usize) -> Result<Self> {
        if array.is_null(row) {
            return Ok(Self::Null);
        }

        let data_type = array.data_type();
        let value = match data_type {
            DataType::Boolean => Self::Bool(array.as_boolean().value(row)),
            DataType::Utf8 => Self::Text(array.as_string::<i32>().value(row).to_string()),
            DataType::LargeUtf8 => Self::Text(array.as_string::<i64>().value(row).to_string()),
            DataType::Date32 => {
                let days = array.as_primitive::<arrow::datatypes::Date32Type>().value(row);
                days_to_date(days).map(Self::Date).unwrap_or(Self::Null)
            }
            t if t.is_integer() => {
                let widened = cast(&array.slice(row, 1), &DataType::Int64)?;
                Self::Int(widened.as_primitive::<Int64Type>().value(0))
            }
            t if t.is_floating() => {
                let widened = cast(&array.slice(row, 1), &DataType::Float64)?;
                Self::Float(widened.as_primitive::<Float64Type>().value(0))
            }
            other => {
                return Err(StatsError::precondition(format!("unsupported cell type {other}")));
            }
        };
        Ok(value)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Int(_) | Self::Float(_) => 1,
            Self::Date(_) => 2,
            Self::Text(_) => 3,
            Self::Null => 4,
        }
    }

    /// Total order: values of one kind compare naturally, nulls sort last
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.rank().cmp(&b.rank()),
            },
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(v) => JsonValue::Bool(*v),
            Self::Int(v) => JsonValue::Number((*v).into()),
            Self::Float(v) => Number::from_f64(*v).map(JsonValue::Number).unwrap_or(JsonValue::Null),
            Self::Text(v) => JsonValue::String(v.clone()),
            Self::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
        }
    }

    /// Build an array of `data_type` from cells. Cells that do not fit the type become null.
    pub fn build_array(data_type: &DataType, cells: &[CellValue]) -> Result<ArrayRef> {
        let array: ArrayRef = match data_type {
            DataType::Boolean => Arc::new(
                cells
                    .iter()
                    .map(|c| match c {
                        Self::Bool(v) => Some(*v),
                        _ => None,
                    })
                    .collect::<BooleanArray>(),
            ),
            DataType::Utf8 => Arc::new(
                cells
                    .iter()
                    .map(|c| match c {
                        Self::Text(v) => Some(v.as_str()),
                        _ => None,
                    })
                    .collect::<StringArray>(),
            ),
            DataType::Date32 => Arc::new(
                cells
                    .iter()
                    .map(|c| match c {
                        Self::Date(d) => Some(date_to_days(*d)),
                        _ => None,
                    })
                    .collect::<Date32Array>(),
            ),
            t if t.is_integer() => {
                let ints: ArrayRef = Arc::new(
                    cells
                        .iter()
                        .map(|c| match c {
                            Self::Int(v) => Some(*v),
                            _ => None,
                        })
                        .collect::<Int64Array>(),
                );
                cast(&ints, t)?
            }
            t if t.is_floating() => {
                let floats: ArrayRef =
                    Arc::new(cells.iter().map(CellValue::as_f64).collect::<Float64Array>());
                cast(&floats, t)?
            }
            other => {
                return Err(StatsError::precondition(format!("unsupported column type {other}")));
            }
        };
        Ok(array)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// All values of one column as cells
pub fn column_cells(array: &ArrayRef) -> Result<Vec<CellValue>> {
    (0..array.len()).map(|row| CellValue::from_array(array, row)).collect()
}

/// Convert a batch into JSON records, one object per row keyed by column name
pub fn batch_to_records(batch: &RecordBatch) -> Result<Vec<Map<String, JsonValue>>> {
    let schema = batch.schema();
    let columns = batch
        .columns()
        .iter()
        .map(column_cells)
        .collect::<Result<Vec<_>>>()?;

    let records = (0..batch.num_rows())
        .map(|row| {
            schema
                .fields()
                .iter()
                .zip(&columns)
                .map(|(field, cells)| (field.name().clone(), cells[row].to_json()))
                .collect()
        })
        .collect();
    Ok(records)
}
