//! Building per-cohort output tables.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::error::Result;
use crate::population::CohortTable;
use crate::time::SimTime;

/// Build a table with one row per tracked cohort
///
/// The leading columns are `year`, `age` and `sex`; each entry of `metrics`
/// adds a `Float64` column whose values are indexed by cohort row (untracked
/// rows are skipped).
///
/// # Errors
/// Returns `Arrow` if a metric vector is shorter than the cohort table
pub fn cohort_record(
    time: SimTime,
    population: &CohortTable,
    metrics: &[(&str, &[f64])],
) -> Result<RecordBatch> {
    let rows: Vec<usize> = population.tracked_indices().collect();

    let mut fields = vec![
        Field::new("year", DataType::Int64, false),
        Field::new("age", DataType::Float64, false),
        Field::new("sex", DataType::Utf8, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![i64::from(time.year()); rows.len()])),
        Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|&i| population.ages()[i]),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|&i| population.sexes()[i].as_str()),
        )),
    ];

    for (name, values) in metrics {
        fields.push(Field::new(*name, DataType::Float64, false));
        let column: Vec<f64> = rows
            .iter()
            .map(|&i| values.get(i).copied())
            .collect::<Option<_>>()
            .ok_or_else(|| {
                arrow::error::ArrowError::InvalidArgumentError(format!(
                    "metric '{name}' has {} values for {} cohorts",
                    values.len(),
                    population.len()
                ))
            })?;
        columns.push(Arc::new(Float64Array::from(column)));
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}
