//! Utilities for working with Arrow arrays
//!
//! Column lookup with numeric type adaptation, and downcasting with clear
//! error messages naming the table and column.

use arrow::array::{Array, ArrayRef};
use arrow::compute::kernels::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;

use crate::error::{Result, SimulationError};

/// Get a column from a record batch, cast to `expected_type`
///
/// # Arguments
/// * `batch` - The record batch containing the column
/// * `table` - Name of the table (for error messages)
/// * `column_name` - The name of the column to extract
/// * `expected_type` - The data type the caller will downcast to
/// * `required` - Whether a missing column is an error
///
/// # Returns
/// * `Ok(Some(ArrayRef))` - The column, converted if necessary
/// * `Ok(None)` - The column is absent and not required
pub fn get_column(
    batch: &RecordBatch,
    table: &str,
    column_name: &str,
    expected_type: &DataType,
    required: bool,
) -> Result<Option<ArrayRef>> {
    let Ok(idx) = batch.schema().index_of(column_name) else {
        if required {
            return Err(SimulationError::artifact(format!(
                "table '{table}' has no column '{column_name}'"
            )));
        }
        return Ok(None);
    };

    let column = batch.column(idx);
    if column.data_type() == expected_type {
        return Ok(Some(column.clone()));
    }

    log::debug!(
        "Converting column '{column_name}' of table '{table}' from {:?} to {expected_type:?}",
        column.data_type()
    );
    let converted = cast::cast(column, expected_type).map_err(|e| {
        SimulationError::artifact(format!(
            "column '{column_name}' of table '{table}' cannot be read as {expected_type:?}: {e}"
        ))
    })?;
    Ok(Some(converted))
}

/// Downcast a column to a specific array type
pub fn downcast_array<'a, A: Array + 'static>(
    array: &'a ArrayRef,
    table: &str,
    column_name: &str,
) -> Result<&'a A> {
    array.as_any().downcast_ref::<A>().ok_or_else(|| {
        SimulationError::artifact(format!(
            "column '{column_name}' of table '{table}' has unexpected type {:?}",
            array.data_type()
        ))
    })
}

/// Check that a column has no nulls
pub fn ensure_no_nulls(array: &ArrayRef, table: &str, column_name: &str) -> Result<()> {
    if array.null_count() > 0 {
        return Err(SimulationError::artifact(format!(
            "column '{column_name}' of table '{table}' contains {} missing values",
            array.null_count()
        )));
    }
    Ok(())
}
