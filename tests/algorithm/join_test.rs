use arrow::array::{Array, AsArray};
use arrow::datatypes::Int64Type;
use survey_pipeline::algorithm::join::COLLISION_SUFFIX;
use survey_pipeline::{DuplicateKeyPolicy, SurveyError, left_join};

use crate::utils::{Person, household_batch, individual_batch, small_survey};

#[test]
fn test_individuals_are_the_base_of_the_join() {
    let (households, individuals) = small_survey();
    let joined = left_join(&individuals, &households, "interview_id", DuplicateKeyPolicy::Reject).unwrap();

    // Every individual once, in input order; household B has no members and is absent
    assert_eq!(joined.batch.num_rows(), 3);
    assert_eq!(joined.unmatched, 1);
    assert!(joined.duplicate_keys.is_empty());

    let keys: Vec<Option<&str>> = joined
        .batch
        .column_by_name("interview_id")
        .unwrap()
        .as_string::<i32>()
        .iter()
        .collect();
    assert_eq!(keys, vec![Some("A"), Some("A"), Some("C")]);

    let sizes = joined
        .batch
        .column_by_name("hh_size")
        .unwrap()
        .as_primitive::<Int64Type>();
    assert_eq!(sizes.value(0), 3);
    assert_eq!(sizes.value(1), 3);
    assert!(sizes.is_null(2));

    // The household key is not repeated
    assert_eq!(joined.batch.num_columns(), individuals.num_columns() + 2);
}

#[test]
fn test_each_individual_carries_its_own_household() {
    let households = household_batch(&[("A", 3, 1), ("B", 5, 0)]);
    let individuals = individual_batch(&[
        Person::adult("A", 1, 34.0),
        Person::adult("B", 2, 29.0),
        Person::child("A", 2, 14.0, Some(-0.4)),
    ]);

    let joined = left_join(&individuals, &households, "interview_id", DuplicateKeyPolicy::Reject).unwrap();
    assert_eq!(joined.batch.num_rows(), 3);
    assert_eq!(joined.unmatched, 0);

    let keys: Vec<Option<&str>> = joined
        .batch
        .column_by_name("interview_id")
        .unwrap()
        .as_string::<i32>()
        .iter()
        .collect();
    assert_eq!(keys, vec![Some("A"), Some("B"), Some("A")]);

    let sizes: Vec<Option<i64>> = joined
        .batch
        .column_by_name("hh_size")
        .unwrap()
        .as_primitive::<Int64Type>()
        .iter()
        .collect();
    assert_eq!(sizes, vec![Some(3), Some(5), Some(3)]);

    let under5: Vec<Option<i64>> = joined
        .batch
        .column_by_name("hh_under5")
        .unwrap()
        .as_primitive::<Int64Type>()
        .iter()
        .collect();
    assert_eq!(under5, vec![Some(1), Some(0), Some(1)]);
}

#[test]
fn test_duplicate_household_keys_are_rejected_by_default() {
    let households = household_batch(&[("A", 3, 1), ("A", 8, 2), ("B", 2, 0), ("B", 2, 0)]);
    let individuals = individual_batch(&[Person::adult("A", 1, 40.0)]);

    let err = left_join(&individuals, &households, "interview_id", DuplicateKeyPolicy::Reject).unwrap_err();
    match err {
        SurveyError::DuplicateKeys { column, keys } => {
            assert_eq!(column, "interview_id");
            assert_eq!(keys, vec!["A".to_string(), "B".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_flagged_duplicates_keep_first_occurrence() {
    let households = household_batch(&[("A", 3, 1), ("A", 8, 2)]);
    let individuals = individual_batch(&[Person::adult("A", 1, 40.0)]);

    let joined = left_join(&individuals, &households, "interview_id", DuplicateKeyPolicy::Flag).unwrap();
    assert_eq!(joined.duplicate_keys, vec!["A".to_string()]);
    assert_eq!(joined.batch.num_rows(), 1);

    let sizes = joined
        .batch
        .column_by_name("hh_size")
        .unwrap()
        .as_primitive::<Int64Type>();
    assert_eq!(sizes.value(0), 3);
}

#[test]
fn test_missing_key_column_is_a_configuration_error() {
    let (households, individuals) = small_survey();
    let err = left_join(&individuals, &households, "hhid", DuplicateKeyPolicy::Reject).unwrap_err();
    assert!(matches!(err, SurveyError::MissingColumn { .. }));
    assert!(err.is_configuration_error());
}

#[test]
fn test_colliding_household_columns_get_a_suffix() {
    let households = household_batch(&[("A", 3, 1)]);
    let individuals = individual_batch(&[Person::adult("A", 1, 40.0)]);
    let renamed = individuals
        .schema()
        .fields()
        .iter()
        .map(|f| {
            if f.name() == "consent" {
                f.as_ref().clone().with_name("hh_under5")
            } else {
                f.as_ref().clone()
            }
        })
        .collect::<Vec<_>>();
    let individuals = arrow::record_batch::RecordBatch::try_new(
        std::sync::Arc::new(arrow::datatypes::Schema::new(renamed)),
        individuals.columns().to_vec(),
    )
    .unwrap();

    let joined = left_join(&individuals, &households, "interview_id", DuplicateKeyPolicy::Reject).unwrap();
    let name = format!("hh_under5{COLLISION_SUFFIX}");
    assert!(joined.batch.column_by_name(&name).is_some());
    assert!(joined.batch.column_by_name("hh_under5").is_some());
}
