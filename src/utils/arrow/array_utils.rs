//! Utilities for working with Arrow arrays.
//!
//! These helpers fetch a named column from a record batch and present it as
//! the Rust type a rule or metric needs, turning absent columns and
//! incompatible types into configuration errors.

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array, StringArray};
use arrow::compute::{can_cast_types, cast};
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use arrow::record_batch::RecordBatch;

use crate::error::{Result, SurveyError};

/// Get a column from a record batch by name
///
/// # Arguments
/// * `batch` - The record batch
/// * `table` - Table name used in the error message
/// * `column_name` - The name of the column to find
///
/// # Errors
/// Returns [`SurveyError::MissingColumn`] if the column does not exist
pub fn get_column<'a>(batch: &'a RecordBatch, table: &str, column_name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(column_name)
        .ok_or_else(|| SurveyError::missing_column(table, column_name))
}

/// Get the column index by name from a record batch
pub fn get_column_index(batch: &RecordBatch, table: &str, column_name: &str) -> Result<usize> {
    batch
        .schema()
        .index_of(column_name)
        .map_err(|_| SurveyError::missing_column(table, column_name))
}

fn cast_column(array: &ArrayRef, column_name: &str, target: &DataType) -> Result<ArrayRef> {
    let source = array.data_type();
    if source == target {
        return Ok(array.clone());
    }
    // Categorical columns are dictionaries of labels; only the text view makes sense
    let numeric_target = matches!(target, DataType::Int64 | DataType::Float64);
    if !can_cast_types(source, target) || (numeric_target && matches!(source, DataType::Dictionary(_, _))) {
        return Err(SurveyError::ColumnType {
            column: column_name.to_string(),
            expected: target.to_string(),
            found: source.to_string(),
        });
    }
    Ok(cast(array, target)?)
}

/// Read a column as `Float64`, casting integer columns
pub fn float_column(batch: &RecordBatch, table: &str, column_name: &str) -> Result<Float64Array> {
    let array = cast_column(get_column(batch, table, column_name)?, column_name, &DataType::Float64)?;
    Ok(array.as_primitive::<Float64Type>().clone())
}

/// Read a column as `Int64`
pub fn int_column(batch: &RecordBatch, table: &str, column_name: &str) -> Result<Int64Array> {
    let array = cast_column(get_column(batch, table, column_name)?, column_name, &DataType::Int64)?;
    Ok(array.as_primitive::<Int64Type>().clone())
}

/// Read a column as text; categorical columns yield their labels
pub fn text_column(batch: &RecordBatch, table: &str, column_name: &str) -> Result<StringArray> {
    let array = cast_column(get_column(batch, table, column_name)?, column_name, &DataType::Utf8)?;
    Ok(array.as_string::<i32>().clone())
}
