//! Left join of individuals onto households
//!
//! The individual table is the base of the join: every individual row appears
//! exactly once in the output, in input order, carrying the columns of its
//! household. Individuals whose household is absent keep null household
//! columns, and households without any individual do not appear at all.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use arrow::array::{Array, ArrayRef, UInt32Array};
use arrow::compute::take;
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashMap;

use crate::config::DuplicateKeyPolicy;
use crate::error::{Result, SurveyError};
use crate::schema::survey::{HOUSEHOLD_TABLE, INDIVIDUAL_TABLE};
use crate::utils::arrow::{get_column_index, text_column};
use crate::utils::logging::{log_operation_complete, log_warning};

/// Suffix given to household columns whose name already exists on the individual side
pub const COLLISION_SUFFIX: &str = "_household";

/// Result of joining the two survey tables
#[derive(Debug, Clone)]
pub struct JoinOutput {
    /// One row per individual with household columns appended
    pub batch: RecordBatch,
    /// Individuals whose key matched no household
    pub unmatched: usize,
    /// Household keys that occurred more than once (only under [`DuplicateKeyPolicy::Flag`])
    pub duplicate_keys: Vec<String>,
}

/// Map each household key to the row of its first occurrence
///
/// Returns the index and the set of keys seen more than once. Null keys can
/// never match and are skipped.
fn index_households<'a>(
    keys: impl Iterator<Item = Option<&'a str>>,
) -> (FxHashMap<&'a str, u32>, BTreeSet<String>) {
    let mut index = FxHashMap::default();
    let mut duplicates = BTreeSet::new();

    for (row, key) in keys.enumerate() {
        let Some(key) = key else { continue };
        if index.contains_key(key) {
            duplicates.insert(key.to_string());
        } else {
            index.insert(key, row as u32);
        }
    }

    (index, duplicates)
}

/// Join households onto individuals by a shared key column
///
/// # Errors
/// * [`SurveyError::MissingColumn`] if either table lacks the key column
/// * [`SurveyError::DuplicateKeys`] if household keys repeat and the policy is
///   [`DuplicateKeyPolicy::Reject`]
pub fn left_join(
    individuals: &RecordBatch,
    households: &RecordBatch,
    key: &str,
    policy: DuplicateKeyPolicy,
) -> Result<JoinOutput> {
    let start = Instant::now();

    let individual_keys = text_column(individuals, INDIVIDUAL_TABLE, key)?;
    let household_keys = text_column(households, HOUSEHOLD_TABLE, key)?;
    let household_key_idx = get_column_index(households, HOUSEHOLD_TABLE, key)?;

    let (index, duplicates) = index_households(household_keys.iter());
    let duplicate_keys: Vec<String> = duplicates.into_iter().collect();
    if !duplicate_keys.is_empty() {
        match policy {
            DuplicateKeyPolicy::Reject => {
                return Err(SurveyError::DuplicateKeys {
                    column: key.to_string(),
                    keys: duplicate_keys,
                });
            }
            DuplicateKeyPolicy::Flag => log_warning(
                &format!(
                    "{} household keys occur more than once, keeping first occurrence",
                    duplicate_keys.len()
                ),
                Some(key),
            ),
        }
    }

    let indices: UInt32Array = individual_keys
        .iter()
        .map(|k| k.and_then(|k| index.get(k).copied()))
        .collect();
    let unmatched = indices.null_count();
    if unmatched > 0 {
        log_warning(
            &format!("{unmatched} individuals have no matching household"),
            Some(key),
        );
    }

    let individual_schema = individuals.schema();
    let mut fields: Vec<Field> = individual_schema
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    let mut columns: Vec<ArrayRef> = individuals.columns().to_vec();

    let household_schema = households.schema();
    for (idx, field) in household_schema.fields().iter().enumerate() {
        if idx == household_key_idx {
            continue;
        }
        let name = if individual_schema.index_of(field.name()).is_ok() {
            format!("{}{COLLISION_SUFFIX}", field.name())
        } else {
            field.name().clone()
        };
        // Unmatched rows take a null index, which yields a null cell
        fields.push(Field::new(name, field.data_type().clone(), true));
        columns.push(take(households.column(idx), &indices, None)?);
    }

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
    log_operation_complete("joined", "individual and household tables", batch.num_rows(), Some(start.elapsed()));

    Ok(JoinOutput {
        batch,
        unmatched,
        duplicate_keys,
    })
}
