//! Vectorized expression evaluation using Arrow kernels

use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Date32Array, Float64Array, RecordBatch};
use arrow::compute::kernels::numeric;
use arrow::datatypes::{DataType, Date32Type};
use chrono::Datelike;

use crate::error::{Result, StatsError};
use crate::utils::{get_column, get_f64_column};
use crate::value::{date_to_days, days_to_date};

/// Arithmetic over numeric columns. Every operand is widened to Float64.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    Literal(f64),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn col(name: &str) -> Self {
        Self::Column(name.to_string())
    }

    pub fn lit(value: f64) -> Self {
        Self::Literal(value)
    }

    pub fn add(self, rhs: Expr) -> Self {
        Self::Add(Box::new(self), Box::new(rhs))
    }

    pub fn sub(self, rhs: Expr) -> Self {
        Self::Sub(Box::new(self), Box::new(rhs))
    }

    pub fn mul(self, rhs: Expr) -> Self {
        Self::Mul(Box::new(self), Box::new(rhs))
    }

    pub fn div(self, rhs: Expr) -> Self {
        Self::Div(Box::new(self), Box::new(rhs))
    }

    /// Evaluate against every row of `batch`
    pub fn evaluate(&self, batch: &RecordBatch) -> Result<Float64Array> {
        let len = batch.num_rows();
        let result: ArrayRef = match self {
            Self::Column(name) => return get_f64_column(batch, name),
            // Build a full array for the constant
            Self::Literal(v) => return Ok(vec![*v; len].into()),
            Self::Add(l, r) => numeric::add(&l.evaluate(batch)?, &r.evaluate(batch)?)?,
            Self::Sub(l, r) => numeric::sub(&l.evaluate(batch)?, &r.evaluate(batch)?)?,
            Self::Mul(l, r) => numeric::mul(&l.evaluate(batch)?, &r.evaluate(batch)?)?,
            Self::Div(l, r) => numeric::div(&l.evaluate(batch)?, &r.evaluate(batch)?)?,
        };
        Ok(result.as_primitive::<arrow::datatypes::Float64Type>().clone())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(name) => write!(f, "{name}"),
            Self::Literal(v) => write!(f, "{v}"),
            Self::Add(l, r) => write!(f, "({l} + {r})"),
            Self::Sub(l, r) => write!(f, "({l} - {r})"),
            Self::Mul(l, r) => write!(f, "({l} * {r})"),
            Self::Div(l, r) => write!(f, "({l} / {r})"),
        }
    }
}

/// Integer-preserving sum of two integer columns, e.g. goals + assists
pub fn add_int_columns(batch: &RecordBatch, left: &str, right: &str) -> Result<ArrayRef> {
    let l = get_column(batch, left)?;
    let r = get_column(batch, right)?;
    if l.data_type() != r.data_type() || !l.data_type().is_integer() {
        return Err(StatsError::precondition(format!(
            "{left} and {right} must share an integer type"
        )));
    }
    Ok(numeric::add(l, r)?)
}

/// Replace every date with the first day of its month
pub fn truncate_to_month(batch: &RecordBatch, column: &str) -> Result<ArrayRef> {
    let col = get_column(batch, column)?;
    if col.data_type() != &DataType::Date32 {
        return Err(StatsError::precondition(format!("column {column} is not a date")));
    }

    let dates = col.as_primitive::<Date32Type>();
    let months: Date32Array = dates
        .iter()
        .map(|days| {
            days.and_then(days_to_date)
                .and_then(|d| d.with_day(1))
                .map(date_to_days)
        })
        .collect();
    Ok(Arc::new(months))
}
