//! Parquet reader and writer for entity tables, with column projection

use std::fs::File;
use std::path::Path;

use arrow::array::RecordBatch;
use arrow_select::concat::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatchReader;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::{ArrowWriter, ProjectionMask};
use tracing::debug;

use crate::error::{Result, StatsError};

/// Rows per decoded batch
pub const BATCH_SIZE: usize = 8192;

/// Read a whole Parquet file into one batch, keeping only `columns`
/// (all columns when `None`).
pub fn read_table(path: &Path, columns: Option<&[&str]>) -> Result<RecordBatch> {
    let file = File::open(path)
        .map_err(|e| StatsError::store(format!("cannot open {}: {e}", path.display())))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let file_schema = builder.schema().clone();

    let builder = match columns {
        Some(columns) => {
            // Find indices of requested columns
            let projection_indices = columns
                .iter()
                .map(|name| {
                    file_schema
                        .fields()
                        .iter()
                        .position(|f| f.name() == *name)
                        .ok_or_else(|| {
                            StatsError::precondition(format!(
                                "column {name} not found in {}",
                                path.display()
                            ))
                        })
                })
                .collect::<Result<Vec<_>>>()?;

            let projection = ProjectionMask::roots(builder.parquet_schema(), projection_indices);
            builder.with_projection(projection)
        }
        None => builder,
    };

    let reader = builder.with_batch_size(BATCH_SIZE).build()?;
    let schema: SchemaRef = reader.schema();

    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    let table = concat_batches(&schema, &batches)?;

    debug!(path = %path.display(), rows = table.num_rows(), "read parquet table");
    Ok(table)
}

/// Write one batch as a Parquet file, replacing any existing file
pub fn write_table(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entity, Team};

    fn teams() -> Vec<Team> {
        vec![
            Team { team_id: 1, team_name: "Napoli".into(), points: 90, goal_difference: 49, ..Team::default() },
            Team { team_id: 2, team_name: "Lazio".into(), points: 74, goal_difference: 18, ..Team::default() },
        ]
    }

    #[test]
    fn test_round_trip_with_projection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("team.parquet");
        write_table(&path, &Team::to_batch(&teams()).unwrap()).unwrap();

        let full = read_table(&path, None).unwrap();
        assert_eq!(full.num_rows(), 2);
        assert_eq!(full.num_columns(), 9);

        let projected = read_table(&path, Some(&["team_name", "points"][..])).unwrap();
        assert_eq!(projected.num_columns(), 2);
        assert_eq!(projected.schema().field(0).name(), "team_name");
    }

    #[test]
    fn test_missing_file_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_table(&dir.path().join("nope.parquet"), None).unwrap_err();
        assert!(matches!(err, StatsError::StoreUnavailable(_)));
    }

    #[test]
    fn test_unknown_column_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("team.parquet");
        write_table(&path, &Team::to_batch(&teams()).unwrap()).unwrap();

        let err = read_table(&path, Some(&["stadium"][..])).unwrap_err();
        assert!(matches!(err, StatsError::TransformPrecondition(_)));
    }
}
