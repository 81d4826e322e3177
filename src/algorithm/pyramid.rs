//! Population pyramid transform
//!
//! A pyramid is a count of people by sex and age group in which one sex is
//! negated, so a back-to-back bar chart can draw it left of the axis.

use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array};
use arrow::record_batch::RecordBatch;

use crate::algorithm::aggregate::{Aggregation, Metric, aggregate};
use crate::algorithm::summary::SummaryTable;
use crate::error::{Result, SurveyError};
use crate::models::categories::{OrderedCategory, Sex};

/// Count column of a pyramid table
pub const PYRAMID_COUNT: &str = "people";

/// Replace one column of a summary table with new values
fn replace_counts(summary: &SummaryTable, column: &str, values: Int64Array) -> Result<SummaryTable> {
    let idx = summary
        .batch
        .schema()
        .index_of(column)
        .map_err(|_| SurveyError::missing_column(&summary.name, column))?;

    let mut columns: Vec<ArrayRef> = summary.batch.columns().to_vec();
    columns[idx] = Arc::new(values);

    Ok(SummaryTable {
        batch: RecordBatch::try_new(summary.batch.schema(), columns)?,
        ..summary.clone()
    })
}

/// Negate the counts of every row whose sex column carries `negate`
///
/// Applying the transform twice restores the original counts.
pub fn mirror_counts(
    summary: &SummaryTable,
    sex_column: &str,
    count_column: &str,
    negate: Sex,
) -> Result<SummaryTable> {
    let sexes = summary.labels(sex_column)?;
    let counts = summary.int_values(count_column)?;

    let mirrored: Int64Array = sexes
        .iter()
        .zip(counts)
        .map(|(sex, count)| {
            count.map(|c| {
                if sex.as_deref() == Some(negate.label()) {
                    -c
                } else {
                    c
                }
            })
        })
        .collect();

    replace_counts(summary, count_column, mirrored)
}

/// Absolute counts of a pyramid, for labelling bars
pub fn pyramid_magnitude(summary: &SummaryTable, count_column: &str) -> Result<SummaryTable> {
    let magnitudes: Int64Array = summary
        .int_values(count_column)?
        .into_iter()
        .map(|c| c.map(i64::abs))
        .collect();
    replace_counts(summary, count_column, magnitudes)
}

/// Count people by sex and age group with one sex negated
pub fn population_pyramid(
    batch: &RecordBatch,
    sex_column: &str,
    age_column: &str,
    negate: Sex,
) -> Result<SummaryTable> {
    let counts = aggregate(
        batch,
        &Aggregation::new("population_pyramid")
            .group_by(sex_column)
            .group_by(age_column)
            .metric(Metric::count(PYRAMID_COUNT)),
    )?;
    mirror_counts(&counts, sex_column, PYRAMID_COUNT, negate)
}
