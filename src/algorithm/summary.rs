//! Summary tables handed to presenters.

use std::fmt;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;

use crate::error::{Result, SurveyError};

/// Label used for the grouping columns of a totals row
pub const TOTAL_LABEL: &str = "Total";

/// Declared label order of one grouping column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLevels {
    /// Grouping column
    pub column: String,
    /// Labels in display order
    pub labels: Vec<String>,
}

/// Result of an aggregation: grouping columns followed by metric columns
///
/// Rows are already in display order. Grouping columns hold text labels; for
/// categorical groupings the full ordered label set is kept in
/// [`SummaryTable::levels`] so legends can list absent categories too.
#[derive(Debug, Clone)]
pub struct SummaryTable {
    /// Table name, also used as output file stem
    pub name: String,
    /// Data
    pub batch: RecordBatch,
    /// Names of the grouping columns, in order
    pub group_columns: Vec<String>,
    /// Declared label order of categorical grouping columns
    pub levels: Vec<GroupLevels>,
    /// Input rows left out because a grouping value was missing
    pub excluded_rows: usize,
}

impl SummaryTable {
    /// Number of summary rows
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Declared labels of a grouping column, if it is categorical
    #[must_use]
    pub fn levels_of(&self, column: &str) -> Option<&[String]> {
        self.levels
            .iter()
            .find(|l| l.column == column)
            .map(|l| l.labels.as_slice())
    }

    fn column(&self, column: &str) -> Result<&ArrayRef> {
        self.batch
            .column_by_name(column)
            .ok_or_else(|| SurveyError::missing_column(&self.name, column))
    }

    /// Text labels of a grouping (or percent) column
    pub fn labels(&self, column: &str) -> Result<Vec<Option<String>>> {
        let array = self.column(column)?;
        let text = array.as_string_opt::<i32>().ok_or_else(|| SurveyError::ColumnType {
            column: column.to_string(),
            expected: DataType::Utf8.to_string(),
            found: array.data_type().to_string(),
        })?;
        Ok(text.iter().map(|v| v.map(str::to_string)).collect())
    }

    /// Values of an integer metric column
    pub fn int_values(&self, column: &str) -> Result<Vec<Option<i64>>> {
        let array = self.column(column)?;
        let values = array
            .as_primitive_opt::<Int64Type>()
            .ok_or_else(|| SurveyError::ColumnType {
                column: column.to_string(),
                expected: DataType::Int64.to_string(),
                found: array.data_type().to_string(),
            })?;
        Ok(values.iter().collect())
    }

    /// Values of a real-valued metric column
    pub fn float_values(&self, column: &str) -> Result<Vec<Option<f64>>> {
        let array = self.column(column)?;
        let values = array
            .as_primitive_opt::<Float64Type>()
            .ok_or_else(|| SurveyError::ColumnType {
                column: column.to_string(),
                expected: DataType::Float64.to_string(),
                found: array.data_type().to_string(),
            })?;
        Ok(values.iter().collect())
    }

    /// Row index of the first row whose grouping columns carry these labels
    #[must_use]
    pub fn find_row(&self, labels: &[&str]) -> Option<usize> {
        let columns: Vec<Vec<Option<String>>> = self
            .group_columns
            .iter()
            .map(|c| self.labels(c))
            .collect::<Result<_>>()
            .ok()?;

        (0..self.num_rows()).find(|&row| {
            labels.len() == columns.len()
                && columns
                    .iter()
                    .zip(labels)
                    .all(|(column, label)| column[row].as_deref() == Some(*label))
        })
    }
}

impl fmt::Display for SummaryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        let table = pretty_format_batches(std::slice::from_ref(&self.batch)).map_err(|_| fmt::Error)?;
        write!(f, "{table}")?;
        if self.excluded_rows > 0 {
            write!(f, "\n({} rows with missing grouping values excluded)", self.excluded_rows)?;
        }
        Ok(())
    }
}
