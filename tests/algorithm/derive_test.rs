use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use survey_pipeline::algorithm::derive::{age_group, child_age_group, household_size_category, wasting_status};
use survey_pipeline::models::CategoricalColumn;
use survey_pipeline::{
    ColumnNames, Deriver, DuplicateKeyPolicy, OrderedCategory, Sex, SurveyError, WastingStatus,
    left_join,
};

use crate::utils::{Person, individual_batch, small_survey};

#[test]
fn test_deriving_twice_gives_the_same_table() {
    let (households, individuals) = small_survey();
    let joined = left_join(&individuals, &households, "interview_id", DuplicateKeyPolicy::Reject).unwrap();
    let deriver = Deriver::for_joined("joined", &ColumnNames::default());

    let once = deriver.apply(&joined.batch).unwrap();
    let twice = deriver.apply(&once.batch).unwrap();

    assert_eq!(once.batch, twice.batch);
    assert_eq!(once.batch.num_columns(), joined.batch.num_columns() + deriver.columns().len());
    assert_eq!(once.reports, twice.reports);
    // The input batch is left untouched
    assert!(joined.batch.column_by_name("age_group").is_none());
}

#[test]
fn test_derived_columns_carry_the_full_label_set() {
    let (households, individuals) = small_survey();
    let joined = left_join(&individuals, &households, "interview_id", DuplicateKeyPolicy::Reject).unwrap();
    let derived = Deriver::for_joined("joined", &ColumnNames::default())
        .apply(&joined.batch)
        .unwrap();

    let wasting = CategoricalColumn::from_array(
        "wasting",
        derived.batch.column_by_name("wasting").unwrap().as_ref(),
    )
    .unwrap();
    assert_eq!(wasting.levels, WastingStatus::LABELS);
    assert_eq!(wasting.value::<WastingStatus>(0), Some(WastingStatus::Moderate));
    assert_eq!(wasting.label(1), None);

    // The unmatched individual has no household size, hence no size category
    let size = CategoricalColumn::from_array(
        "hh_size_cat",
        derived.batch.column_by_name("hh_size_cat").unwrap().as_ref(),
    )
    .unwrap();
    assert_eq!(size.label(0), Some("1-4"));
    assert_eq!(size.label(2), None);
    let size_report = derived.reports.iter().find(|r| r.column == "hh_size_cat").unwrap();
    assert_eq!(size_report.missing_input, 1);
    assert_eq!(size_report.out_of_range, 0);
}

#[test]
fn test_sex_recode_keeps_missing_codes_missing() {
    let mut unknown = Person::adult("A", 1, 30.0);
    unknown.sex = None;
    let individuals = individual_batch(&[
        Person::adult("A", 1, 30.0),
        Person::adult("A", 2, 30.0),
        unknown,
    ]);
    let derived = Deriver::for_joined("individual", &ColumnNames::default());
    // The individual table alone lacks the household size input
    let err = derived.apply(&individuals).unwrap_err();
    assert!(matches!(err, SurveyError::MissingColumn { ref column, .. } if column == "hh_size"));

    let (households, _) = small_survey();
    let joined = left_join(&individuals, &households, "interview_id", DuplicateKeyPolicy::Reject).unwrap();
    let derived = derived.apply(&joined.batch).unwrap();
    let sex = CategoricalColumn::from_array(
        "sex_label",
        derived.batch.column_by_name("sex_label").unwrap().as_ref(),
    )
    .unwrap();
    assert_eq!(sex.value::<Sex>(0), Some(Sex::Male));
    assert_eq!(sex.value::<Sex>(1), Some(Sex::Female));
    assert_eq!(sex.value::<Sex>(2), None);
}

#[test]
fn test_bucketing_is_total_and_partitions_the_range() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..5_000 {
        let years: f64 = rng.random_range(0.0..120.0);
        let group = age_group(Some(years)).expect("every non-negative age has a band");
        assert!(years >= f64::from(group.lower_bound()));
        if let Some(upper) = group.upper_bound() {
            assert!(years < f64::from(upper));
        }

        let months: f64 = rng.random_range(0.0..60.0);
        assert!(child_age_group(Some(months)).is_some());
        let older: f64 = rng.random_range(60.0..240.0);
        assert!(child_age_group(Some(older)).is_none());

        let size: i64 = rng.random_range(0..40);
        assert!(household_size_category(Some(size)).is_some());

        let z: f64 = rng.random_range(-6.0..6.0);
        let status = wasting_status(Some(z)).expect("every finite z-score has a status");
        let expected = if z >= -2.0 {
            WastingStatus::NoWasting
        } else if z >= -3.0 {
            WastingStatus::Moderate
        } else {
            WastingStatus::Severe
        };
        assert_eq!(status, expected);
    }
}
