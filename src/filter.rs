//! Vectorized row filtering using Arrow compute kernels

use arrow::array::{Array, BooleanArray, Int64Array, RecordBatch, Scalar, StringArray};
use arrow::compute::kernels::{cmp, comparison};
use arrow::compute::{self, cast};
use arrow::datatypes::DataType;

use crate::error::{Result, StatsError};
use crate::utils::get_column;

/// One filter condition over a single column
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// column >= value
    GtEq(String, i64),
    /// column > value
    Gt(String, i64),
    /// column <= value
    LtEq(String, i64),
    NotNull(String),
    /// Case-insensitive substring match on a text column
    ContainsIgnoreCase(String, String),
}

impl Predicate {
    pub fn gt_eq(column: &str, value: i64) -> Self {
        Self::GtEq(column.to_string(), value)
    }

    pub fn gt(column: &str, value: i64) -> Self {
        Self::Gt(column.to_string(), value)
    }

    pub fn lt_eq(column: &str, value: i64) -> Self {
        Self::LtEq(column.to_string(), value)
    }

    pub fn not_null(column: &str) -> Self {
        Self::NotNull(column.to_string())
    }

    pub fn contains_ignore_case(column: &str, needle: &str) -> Self {
        Self::ContainsIgnoreCase(column.to_string(), needle.to_string())
    }

    pub fn column(&self) -> &str {
        match self {
            Self::GtEq(c, _)
            | Self::Gt(c, _)
            | Self::LtEq(c, _)
            | Self::NotNull(c)
            | Self::ContainsIgnoreCase(c, _) => c,
        }
    }

    /// Evaluate to a selection mask. Null cells never match.
    pub fn mask(&self, batch: &RecordBatch) -> Result<BooleanArray> {
        let col = get_column(batch, self.column())?;

        let mask = match self {
            Self::GtEq(_, v) | Self::Gt(_, v) | Self::LtEq(_, v) => {
                if !col.data_type().is_integer() {
                    return Err(StatsError::precondition(format!(
                        "cannot compare {} column {} with an integer",
                        col.data_type(),
                        self.column()
                    )));
                }
                let values = cast(col, &DataType::Int64)?;
                let scalar = Scalar::new(Int64Array::from(vec![*v]));
                match self {
                    Self::GtEq(..) => cmp::gt_eq(&values, &scalar)?,
                    Self::Gt(..) => cmp::gt(&values, &scalar)?,
                    _ => cmp::lt_eq(&values, &scalar)?,
                }
            }
            Self::NotNull(_) => compute::is_not_null(col.as_ref())?,
            Self::ContainsIgnoreCase(_, needle) => {
                let values = cast(col, &DataType::Utf8)?;
                let pattern = Scalar::new(StringArray::from(vec![format!("%{}%", escape_like(needle))]));
                comparison::ilike(&values, &pattern)?
            }
        };

        Ok(mask)
    }
}

/// Escape LIKE wildcards so the needle matches literally
fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// AND all predicates together and keep the matching rows.
/// No predicates keeps every row.
pub fn apply_filters(batch: &RecordBatch, predicates: &[Predicate]) -> Result<RecordBatch> {
    if predicates.is_empty() {
        return Ok(batch.clone());
    }

    let mut mask = predicates[0].mask(batch)?;
    for predicate in &predicates[1..] {
        mask = compute::and(&mask, &predicate.mask(batch)?)?;
    }

    // Null mask slots drop the row, matching SQL WHERE
    let filtered = compute::filter_record_batch(batch, &mask)?;
    Ok(filtered)
}

/// Number of rows that pass all predicates
pub fn count_matching_rows(batch: &RecordBatch, predicates: &[Predicate]) -> Result<usize> {
    Ok(apply_filters(batch, predicates)?.num_rows())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::ArrayRef;
    use std::sync::Arc;

    fn teams() -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            (
                "team_name",
                Arc::new(StringArray::from(vec![Some("Inter"), Some("Internazionale B"), None, Some("Milan")]))
                    as ArrayRef,
            ),
            ("points", Arc::new(Int64Array::from(vec![Some(89), Some(50), Some(70), None])) as ArrayRef),
            ("goal_difference", Arc::new(Int64Array::from(vec![57, 10, 25, 30])) as ArrayRef),
        ])
        .unwrap()
    }

    #[test]
    fn test_and_of_comparisons() {
        let filtered = apply_filters(
            &teams(),
            &[Predicate::gt_eq("points", 50), Predicate::gt("goal_difference", 20)],
        )
        .unwrap();
        assert_eq!(filtered.num_rows(), 2);

        // null points never satisfy the comparison
        assert_eq!(count_matching_rows(&teams(), &[Predicate::lt_eq("points", 100)]).unwrap(), 3);
    }

    #[test]
    fn test_contains_ignore_case() {
        let n = count_matching_rows(&teams(), &[Predicate::contains_ignore_case("team_name", "INTER")])
            .unwrap();
        assert_eq!(n, 2);
    }

    #[test]
    fn test_contains_treats_wildcards_literally() {
        let batch = RecordBatch::try_from_iter(vec![(
            "team_name",
            Arc::new(StringArray::from(vec!["Hellas_Verona", "Hellas Verona", "100% Roma", "Roma"])) as ArrayRef,
        )])
        .unwrap();
        let count = |needle| count_matching_rows(&batch, &[Predicate::contains_ignore_case("team_name", needle)]).unwrap();
        assert_eq!(count("s_v"), 1);
        assert_eq!(count("0% r"), 1);
        assert_eq!(count("%"), 1);
        assert_eq!(count(""), 4);
    }

    #[test]
    fn test_not_null() {
        let n = count_matching_rows(&teams(), &[Predicate::not_null("team_name")]).unwrap();
        assert_eq!(n, 3);
    }

    #[test]
    fn test_comparison_on_text_fails_fast() {
        let err = apply_filters(&teams(), &[Predicate::gt("team_name", 1)]).unwrap_err();
        assert!(matches!(err, StatsError::TransformPrecondition(_)));
    }

    #[test]
    fn test_empty_input() {
        let empty = teams().slice(0, 0);
        let filtered = apply_filters(&empty, &[Predicate::gt_eq("points", 0)]).unwrap();
        assert_eq!(filtered.num_rows(), 0);
    }
}
