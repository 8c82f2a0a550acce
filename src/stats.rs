//! Descriptive statistics for every numeric column of a result table

use std::collections::BTreeMap;

use arrow::array::RecordBatch;
use serde::Serialize;

use crate::utils::{get_f64_column, is_numeric};

/// Summary of one numeric column. `std` is the sample standard deviation
/// (n - 1 denominator), reported as 0 for a single value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnStatistics {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
}

impl ColumnStatistics {
    /// `None` when there are no values
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };
        let std = if n < 2 {
            0.0
        } else {
            let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            variance.sqrt()
        };

        Some(Self { mean, median, min: sorted[0], max: sorted[n - 1], std })
    }
}

/// Statistics keyed by column name. Non-numeric columns and columns with no
/// non-null values are left out; an empty table gives an empty map.
pub fn summarize(batch: &RecordBatch) -> BTreeMap<String, ColumnStatistics> {
    let mut stats = BTreeMap::new();
    if batch.num_rows() == 0 {
        return stats;
    }

    for field in batch.schema().fields() {
        if !is_numeric(field.data_type()) {
            continue;
        }
        // numeric columns always cast to Float64
        let Ok(values) = get_f64_column(batch, field.name()) else {
            continue;
        };
        let values: Vec<f64> = values.iter().flatten().collect();
        if let Some(column_stats) = ColumnStatistics::from_values(&values) {
            stats.insert(field.name().clone(), column_stats);
        }
    }

    stats
}
